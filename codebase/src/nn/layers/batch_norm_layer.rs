use std::ops::AddAssign;
use anyhow::bail;
use ndarray::{ArrayView4, Axis};
use crate::nn::generic_storage::*;
use crate::nn::layers::nn_layers::*;
use crate::nn::lr_calculators::lr_calculator::{apply_lr_calc, LrCalc, LrCalcData};
use crate::utils::{Array1F, Array4F, GetBatchSize};

#[derive(Clone, Debug)]
pub struct BatchNormConfig {
    pub channels: usize,
    /// Weight of the old value when updating the running statistics
    pub momentum: f32,
    pub epsilon: f32,
    pub lr_calc: LrCalc,
}

impl BatchNormConfig {
    pub fn new(channels: usize, lr_calc: LrCalc) -> Self {
        Self { channels, momentum: 0.9, epsilon: 1e-5, lr_calc }
    }
}

pub struct BatchNormLayer {}

fn gen_name(config: &BatchNormConfig) -> String {
    format!("batch_norm_{}", config.channels)
}

/// View of a channel vector that broadcasts over (Batch, Channels, Height, Width)
fn per_channel(values: &Array1F) -> ArrayView4<f32> {
    values.view().insert_axis(Axis(0)).insert_axis(Axis(2)).insert_axis(Axis(3))
}

fn channel_sum(values: &Array4F) -> Array1F {
    values.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0))
}

impl LayerOps<BatchNormConfig> for BatchNormLayer {
    fn init(data: InitData, layer_config: &BatchNormConfig) -> EmptyLayerResult {
        let InitData { assigner, storage, .. } = data;
        let key = assigner.get_key(gen_name(layer_config));
        let channels = layer_config.channels;

        storage.entry(key).or_insert_with(|| vec![
            Array1F::ones(channels).into_dyn(),
            Array1F::zeros(channels).into_dyn(),
            Array1F::zeros(channels).into_dyn(),
            Array1F::ones(channels).into_dyn(),
        ]);
        Ok(())
    }

    fn forward(data: ForwardData, layer_config: &BatchNormConfig) -> LayerResult {
        let ForwardData { inputs, batch_config, assigner, storage, forward_cache } = data;
        let key = assigner.get_key(gen_name(layer_config));

        let inputs: Array4F = inputs.into_dimensionality()?;
        if inputs.shape()[1] != layer_config.channels {
            bail!("batch norm expected {} channels but got {}", layer_config.channels, inputs.shape()[1]);
        }

        let [gamma, beta, running_mean, running_var] = clone_from_storage4(storage, &key)?;
        let gamma: Array1F = gamma.into_dimensionality()?;
        let beta: Array1F = beta.into_dimensionality()?;

        let (mean, var): (Array1F, Array1F) = if batch_config.is_training {
            let count = (inputs.len() / layer_config.channels.max(1)).max(1) as f32;
            let mean = channel_sum(&inputs) / count;
            let centered = &inputs - &per_channel(&mean);
            let var = channel_sum(&(&centered * &centered)) / count;
            (mean, var)
        } else {
            (running_mean.into_dimensionality()?, running_var.into_dimensionality()?)
        };

        let inv_std = var.mapv(|o| 1.0 / (o + layer_config.epsilon).sqrt());
        let normalized = (&inputs - &per_channel(&mean)) * &per_channel(&inv_std);
        let result = &normalized * &per_channel(&gamma) + &per_channel(&beta);

        if let Some(forward_cache) = forward_cache {
            forward_cache.insert(key, vec![
                normalized.into_dyn(),
                inv_std.into_dyn(),
                mean.into_dyn(),
                var.into_dyn(),
            ]);
        }

        Ok(result.into_dyn())
    }

    fn backward(data: BackwardData, layer_config: &BatchNormConfig) -> LayerResult {
        let BackwardData { grad, assigner, storage, forward_cache, backward_cache, .. } = data;
        let key = assigner.get_key(gen_name(layer_config));

        let [gamma] = clone_from_storage1(storage, &key)?;
        let gamma: Array1F = gamma.into_dimensionality()?;
        let [normalized, inv_std, mean, var] = remove_from_storage4(forward_cache, &key)?;
        let normalized: Array4F = normalized.into_dimensionality()?;
        let inv_std: Array1F = inv_std.into_dimensionality()?;

        let grad: Array4F = grad.into_dimensionality()?;
        let batch = grad.batch_size().max(1) as f32;
        let count = (grad.len() / layer_config.channels.max(1)).max(1) as f32;

        let grad_sum = channel_sum(&grad);
        let grad_normalized_sum = channel_sum(&(&grad * &normalized));

        // dx = gamma * inv_std / N * (N * g - sum(g) - x_hat * sum(g * x_hat))
        let scale = &gamma * &inv_std / count;
        let inputs_grad = (&grad * count
            - &per_channel(&grad_sum)
            - &normalized * &per_channel(&grad_normalized_sum))
            * &per_channel(&scale);

        backward_cache.insert(key, vec![
            (grad_normalized_sum / batch).into_dyn(),
            (grad_sum / batch).into_dyn(),
            mean,
            var,
        ]);

        Ok(inputs_grad.into_dyn())
    }
}

impl TrainableLayerOps<BatchNormConfig> for BatchNormLayer {
    fn train(data: TrainData, layer_config: &BatchNormConfig) -> EmptyLayerResult {
        let TrainData { batch_config, assigner, storage, backward_cache } = data;
        let key = assigner.get_key(gen_name(layer_config));

        let [gamma_grad, beta_grad, batch_mean, batch_var] = remove_from_storage4(backward_cache, &key)?;

        let gamma_grad = apply_lr_calc(&layer_config.lr_calc, gamma_grad, LrCalcData {
            batch_config,
            storage,
            assigner,
        })?;
        let beta_grad = apply_lr_calc(&layer_config.lr_calc, beta_grad, LrCalcData {
            batch_config,
            storage,
            assigner,
        })?;

        get_mut_from_storage(storage, &key, 0)?.add_assign(&gamma_grad);
        get_mut_from_storage(storage, &key, 1)?.add_assign(&beta_grad);

        let momentum = layer_config.momentum;
        let running_mean = get_mut_from_storage(storage, &key, 2)?;
        *running_mean = &*running_mean * momentum + batch_mean * (1.0 - momentum);
        let running_var = get_mut_from_storage(storage, &key, 3)?;
        *running_var = &*running_var * momentum + batch_var * (1.0 - momentum);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::nn::batch_config::BatchConfig;
    use crate::nn::key_assigner::KeyAssigner;
    use crate::nn::lr_calculators::constant_lr::ConstantLrConfig;
    use super::*;

    fn config() -> BatchNormConfig {
        BatchNormConfig::new(3, LrCalc::Constant(ConstantLrConfig::default()))
    }

    fn init_storage(config: &BatchNormConfig) -> GenericStorage {
        let mut storage = GenericStorage::new();
        BatchNormLayer::init(InitData { assigner: &mut KeyAssigner::new(), storage: &mut storage, rng: &mut StdRng::seed_from_u64(0) }, config).unwrap();
        storage
    }

    fn forward(inputs: &Array4F, storage: &GenericStorage, batch_config: &BatchConfig, cache: Option<&mut GenericStorage>) -> Array4F {
        BatchNormLayer::forward(ForwardData {
            inputs: inputs.clone().into_dyn(),
            batch_config,
            assigner: &mut KeyAssigner::new(),
            storage,
            forward_cache: cache,
        }, &config()).unwrap().into_dimensionality().unwrap()
    }

    #[test]
    fn test_train_forward_normalizes() {
        let config = config();
        let storage = init_storage(&config);
        let inputs = Array4F::random((4, 3, 5, 5), Normal::new(3.0, 2.0).unwrap());

        let result = forward(&inputs, &storage, &BatchConfig::new_train(), None);
        let count = (4 * 5 * 5) as f32;
        let mean = channel_sum(&result) / count;
        let var = channel_sum(&(&result * &result)) / count;
        assert!(mean.iter().all(|o| o.abs() < 1e-3));
        assert!(var.iter().all(|o| (o - 1.0).abs() < 1e-2));
    }

    #[test]
    fn test_eval_forward_uses_running_stats() {
        let config = config();
        let mut storage = init_storage(&config);
        storage.get_mut("batch_norm_3_0").unwrap()[2] = Array1F::from(vec![1.0, 2.0, 3.0]).into_dyn();
        storage.get_mut("batch_norm_3_0").unwrap()[3] = Array1F::from(vec![4.0, 4.0, 4.0]).into_dyn();

        let inputs = Array4F::from_elem((1, 3, 1, 1), 5.0);
        let result = forward(&inputs, &storage, &BatchConfig::new_not_train(), None);
        assert!((result[(0, 0, 0, 0)] - 2.0).abs() < 1e-3);
        assert!((result[(0, 1, 0, 0)] - 1.5).abs() < 1e-3);
        assert!((result[(0, 2, 0, 0)] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_inputs_grad_matches_finite_differences() {
        let config = config();
        let mut storage = init_storage(&config);
        storage.get_mut("batch_norm_3_0").unwrap()[0] = Array1F::from(vec![0.5, 2.0, -1.0]).into_dyn();

        let dist = Normal::new(0.0, 1.0).unwrap();
        let inputs = Array4F::random((3, 3, 2, 2), dist);
        let grad = Array4F::random((3, 3, 2, 2), dist);
        let batch_config = BatchConfig::new_train();

        let mut forward_cache = GenericStorage::new();
        forward(&inputs, &storage, &batch_config, Some(&mut forward_cache));
        let mut backward_cache = GenericStorage::new();
        let inputs_grad: Array4F = BatchNormLayer::backward(BackwardData {
            grad: grad.clone().into_dyn(),
            batch_config: &batch_config,
            assigner: &mut KeyAssigner::new(),
            storage: &storage,
            forward_cache: &mut forward_cache,
            backward_cache: &mut backward_cache,
        }, &config).unwrap().into_dimensionality().unwrap();

        let objective = |inputs: &Array4F| (forward(inputs, &storage, &batch_config, None) * &grad).sum();
        let delta = 1e-2;
        for index in [(0, 0, 0, 0), (1, 1, 1, 0), (2, 2, 0, 1)] {
            let mut plus = inputs.clone();
            plus[index] += delta;
            let mut minus = inputs.clone();
            minus[index] -= delta;
            let numeric = (objective(&plus) - objective(&minus)) / (2.0 * delta);
            assert!((numeric - inputs_grad[index]).abs() < 2e-2, "{} {}", numeric, inputs_grad[index]);
        }
        assert_eq!(backward_cache["batch_norm_3_0"].len(), 4);
    }

    #[test]
    fn test_train_moves_running_stats() {
        let config = config();
        let mut storage = init_storage(&config);
        let mut backward_cache = GenericStorage::new();
        backward_cache.insert("batch_norm_3_0".to_owned(), vec![
            Array1F::zeros(3).into_dyn(),
            Array1F::zeros(3).into_dyn(),
            Array1F::from_elem(3, 10.0).into_dyn(),
            Array1F::from_elem(3, 11.0).into_dyn(),
        ]);

        BatchNormLayer::train(TrainData {
            batch_config: &BatchConfig::new_train(),
            assigner: &mut KeyAssigner::new(),
            storage: &mut storage,
            backward_cache: &mut backward_cache,
        }, &config).unwrap();

        let stored = &storage["batch_norm_3_0"];
        assert!((stored[2][0] - 1.0).abs() < 1e-5);
        assert!((stored[3][0] - 2.0).abs() < 1e-5);
    }
}

use crate::nn::layers::nn_layers::LayerResult;
use crate::nn::lr_calculators::lr_calculator::{LrCalcData, LrCalcOps};
use crate::utils::{ArrayDynF, lerp_arrays};

#[derive(Clone, Debug)]
pub struct AdamConfig {
    pub alpha: f32,
    pub decay1: f32,
    pub decay2: f32,
    pub epsilon: f32,
}

impl AdamConfig {
    pub fn with_lr(alpha: f32) -> Self {
        Self { alpha, ..Self::default() }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            alpha: 0.001,
            decay1: 0.9,
            decay2: 0.999,
            epsilon: 1e-8,
        }
    }
}

pub struct AdamLrCalc {}

/// Moments live in the model storage under "adam_{n}" keys, so they are saved with the checkpoints
impl LrCalcOps<AdamConfig> for AdamLrCalc {
    fn apply(target: ArrayDynF, data: LrCalcData, config: &AdamConfig) -> LayerResult {
        let LrCalcData { storage, assigner, batch_config } = data;
        let key = assigner.get_key("adam".to_owned());

        let (mut moment1, mut moment2) = match storage.remove(&key) {
            Some(v) if v.len() == 2 && v[0].shape() == target.shape() => {
                let mut v = v.into_iter();
                match (v.next(), v.next()) {
                    (Some(m1), Some(m2)) => (m1, m2),
                    _ => (ArrayDynF::zeros(target.shape()), ArrayDynF::zeros(target.shape())),
                }
            }
            _ => (ArrayDynF::zeros(target.shape()), ArrayDynF::zeros(target.shape())),
        };

        moment1 = lerp_arrays(&target, &moment1, config.decay1);
        moment2 = lerp_arrays(&(&target * &target), &moment2, config.decay2);

        let step = batch_config.iteration.min(i32::MAX as u64).max(1) as i32;
        let moment1b = &moment1 / (1.0 - config.decay1.powi(step));
        let moment2b = &moment2 / (1.0 - config.decay2.powi(step));

        storage.insert(key, vec![moment1, moment2]);

        let alpha = config.alpha * batch_config.lr_multiplier;
        Ok(moment1b * alpha / (moment2b.mapv_into(f32::sqrt) + config.epsilon))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use crate::nn::batch_config::BatchConfig;
    use crate::nn::key_assigner::KeyAssigner;
    use crate::nn::layers::nn_layers::GenericStorage;
    use super::*;

    #[test]
    fn test_first_step_is_alpha_sized() {
        let mut storage = GenericStorage::new();
        let config = AdamConfig::with_lr(0.01);
        let result = AdamLrCalc::apply(
            array![4.0, -0.5].into_dyn(),
            LrCalcData {
                batch_config: &BatchConfig::new_train_step(1, 1.0),
                assigner: &mut KeyAssigner::new(),
                storage: &mut storage,
            },
            &config,
        ).unwrap();

        // With bias correction the first step is alpha * sign(grad)
        assert!((result[0] - 0.01).abs() < 1e-5);
        assert!((result[1] + 0.01).abs() < 1e-5);
        assert_eq!(storage["adam_0"].len(), 2);
    }

    #[test]
    fn test_lr_multiplier_scales_step() {
        let mut storage = GenericStorage::new();
        let result = AdamLrCalc::apply(
            array![1.0].into_dyn(),
            LrCalcData {
                batch_config: &BatchConfig::new_train_step(1, 0.5),
                assigner: &mut KeyAssigner::new(),
                storage: &mut storage,
            },
            &AdamConfig::with_lr(0.01),
        ).unwrap();
        assert!((result[0] - 0.005).abs() < 1e-5);
    }
}

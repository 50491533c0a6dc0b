use crate::nn::generic_storage::remove_from_storage1;
use crate::nn::layers::nn_layers::*;

pub(crate) struct ReluLayer;

fn gen_name() -> String {
    "relu".to_owned()
}

impl LayerOps<()> for ReluLayer {
    fn init(_: InitData, _: &()) -> EmptyLayerResult { Ok(()) }

    fn forward(data: ForwardData, _: &()) -> LayerResult {
        let ForwardData { assigner, inputs, forward_cache, .. } = data;
        let key = assigner.get_key(gen_name());

        let result = inputs.mapv_into(|o| if o > 0.0 { o } else { 0.0 });
        if let Some(forward_cache) = forward_cache {
            forward_cache.insert(key, vec![result.clone()]);
        }
        Ok(result)
    }

    fn backward(data: BackwardData, _: &()) -> LayerResult {
        let BackwardData { assigner, forward_cache, grad, .. } = data;
        let key = assigner.get_key(gen_name());

        let [cache] = remove_from_storage1(forward_cache, &key)?;
        Ok(grad * cache.mapv_into(|o| if o > 0.0 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use crate::nn::batch_config::BatchConfig;
    use crate::nn::key_assigner::KeyAssigner;
    use crate::utils::arrays_almost_equal;
    use super::*;

    #[test]
    fn test_forward_backward() {
        let storage = GenericStorage::new();
        let mut forward_cache = GenericStorage::new();
        let mut backward_cache = GenericStorage::new();
        let mut assigner = KeyAssigner::new();

        let output = ReluLayer::forward(ForwardData {
            inputs: array![[-1.0, 0.5], [2.0, -0.1]].into_dyn(),
            batch_config: &BatchConfig::new_train(),
            assigner: &mut assigner,
            storage: &storage,
            forward_cache: Some(&mut forward_cache),
        }, &()).unwrap();
        assert!(arrays_almost_equal(&output, &array![[0.0, 0.5], [2.0, 0.0]].into_dyn()));

        assigner.revert();
        let grad = ReluLayer::backward(BackwardData {
            grad: array![[1.0, 1.0], [3.0, 3.0]].into_dyn(),
            batch_config: &BatchConfig::new_train(),
            assigner: &mut assigner,
            storage: &storage,
            forward_cache: &mut forward_cache,
            backward_cache: &mut backward_cache,
        }, &()).unwrap();
        assert!(arrays_almost_equal(&grad, &array![[0.0, 1.0], [3.0, 0.0]].into_dyn()));
        assert!(forward_cache.is_empty());
    }
}

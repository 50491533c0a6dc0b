use crate::nn::layers::nn_layers::*;

#[derive(Clone, Debug)]
pub struct SequentialConfig {
    pub layers: Vec<Layer>,
}

pub struct SequentialLayer {}

impl LayerOps<SequentialConfig> for SequentialLayer {
    fn init(data: InitData, layer_config: &SequentialConfig) -> EmptyLayerResult {
        for layer in layer_config.layers.iter() {
            init_layer(layer, InitData {
                assigner: data.assigner,
                storage: data.storage,
                rng: data.rng,
            })?;
        }
        Ok(())
    }

    fn forward(mut data: ForwardData, layer_config: &SequentialConfig) -> LayerResult {
        let mut inputs = data.inputs;

        for layer in layer_config.layers.iter() {
            let data = ForwardData {
                inputs,
                assigner: data.assigner,
                forward_cache: data.forward_cache.as_deref_mut(),
                storage: data.storage,
                batch_config: data.batch_config,
            };
            inputs = forward_layer(layer, data)?;
        }
        Ok(inputs)
    }

    fn backward(data: BackwardData, layer_config: &SequentialConfig) -> LayerResult {
        let mut grad = data.grad;
        for layer in layer_config.layers.iter().rev() {
            let data = BackwardData {
                grad,
                assigner: data.assigner,
                forward_cache: data.forward_cache,
                backward_cache: data.backward_cache,
                batch_config: data.batch_config,
                storage: data.storage,
            };
            grad = backward_layer(layer, data)?;
        }
        Ok(grad)
    }
}

impl TrainableLayerOps<SequentialConfig> for SequentialLayer {
    fn train(data: TrainData, layer_config: &SequentialConfig) -> EmptyLayerResult {
        for layer in layer_config.layers.iter() {
            let train_data = TrainData { storage: data.storage, batch_config: data.batch_config, assigner: data.assigner, backward_cache: data.backward_cache };
            train_layer(layer, train_data)?;
        }
        Ok(())
    }
}

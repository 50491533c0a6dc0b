use crate::nn::layers::nn_layers::*;

#[derive(Clone, Debug)]
pub struct ResidualConfig {
    pub main: Box<Layer>,
    /// Identity when None
    pub shortcut: Option<Box<Layer>>,
}

pub struct ResidualLayer {}

impl LayerOps<ResidualConfig> for ResidualLayer {
    fn init(data: InitData, layer_config: &ResidualConfig) -> EmptyLayerResult {
        init_layer(&layer_config.main, InitData { assigner: data.assigner, storage: data.storage, rng: data.rng })?;
        if let Some(shortcut) = &layer_config.shortcut {
            init_layer(shortcut, InitData { assigner: data.assigner, storage: data.storage, rng: data.rng })?;
        }
        Ok(())
    }

    fn forward(mut data: ForwardData, layer_config: &ResidualConfig) -> LayerResult {
        let inputs = data.inputs;

        let main = forward_layer(&layer_config.main, ForwardData {
            inputs: inputs.clone(),
            assigner: data.assigner,
            forward_cache: data.forward_cache.as_deref_mut(),
            storage: data.storage,
            batch_config: data.batch_config,
        })?;

        let shortcut = match &layer_config.shortcut {
            Some(shortcut) => forward_layer(shortcut, ForwardData {
                inputs,
                assigner: data.assigner,
                forward_cache: data.forward_cache.as_deref_mut(),
                storage: data.storage,
                batch_config: data.batch_config,
            })?,
            None => inputs,
        };

        if main.shape() != shortcut.shape() {
            anyhow::bail!("residual paths disagree: {:?} and {:?}", main.shape(), shortcut.shape());
        }
        Ok(main + shortcut)
    }

    /// Visits the paths in the opposite order of **forward**
    fn backward(data: BackwardData, layer_config: &ResidualConfig) -> LayerResult {
        let grad = data.grad;

        let shortcut_grad = match &layer_config.shortcut {
            Some(shortcut) => backward_layer(shortcut, BackwardData {
                grad: grad.clone(),
                assigner: data.assigner,
                forward_cache: data.forward_cache,
                backward_cache: data.backward_cache,
                batch_config: data.batch_config,
                storage: data.storage,
            })?,
            None => grad.clone(),
        };

        let main_grad = backward_layer(&layer_config.main, BackwardData {
            grad,
            assigner: data.assigner,
            forward_cache: data.forward_cache,
            backward_cache: data.backward_cache,
            batch_config: data.batch_config,
            storage: data.storage,
        })?;

        Ok(main_grad + shortcut_grad)
    }
}

impl TrainableLayerOps<ResidualConfig> for ResidualLayer {
    fn train(data: TrainData, layer_config: &ResidualConfig) -> EmptyLayerResult {
        train_layer(&layer_config.main, TrainData {
            storage: data.storage,
            batch_config: data.batch_config,
            assigner: data.assigner,
            backward_cache: data.backward_cache,
        })?;
        if let Some(shortcut) = &layer_config.shortcut {
            train_layer(shortcut, TrainData {
                storage: data.storage,
                batch_config: data.batch_config,
                assigner: data.assigner,
                backward_cache: data.backward_cache,
            })?;
        }
        Ok(())
    }
}

use crate::ArrayDynF;
use crate::nn::batch_config::{BatchConfig, ForwardMode};
use crate::nn::controller::NNController;
use crate::nn::key_assigner::KeyAssigner;
use crate::nn::layers::nn_layers::{forward_layer, ForwardData};
use crate::utils::GenericResult;

impl NNController {
    /// Forward the input through the layers and return the result. Parameters are not changed.
    /// In **Train** mode, batch norm uses the statistics of this batch.
    pub fn forward(&self, inputs: ArrayDynF, mode: ForwardMode) -> GenericResult<ArrayDynF> {
        let mut assigner = KeyAssigner::new();
        let config = BatchConfig::for_mode(mode);

        forward_layer(
            &self.main_layer,
            ForwardData {
                inputs,
                assigner: &mut assigner,
                storage: &self.storage,
                forward_cache: None,
                batch_config: &config,
            },
        )
    }
}

use crate::ArrayDynF;
use crate::nn::batch_config::BatchConfig;
use crate::nn::controller::NNController;
use crate::nn::key_assigner::KeyAssigner;
use crate::nn::layers::nn_layers::*;
use crate::nn::loss::loss_func::{calc_masked_loss, calc_masked_loss_grad};
use crate::utils::GenericResult;

impl NNController {
    /// Same as **train_batch_masked** with every output selected
    pub fn train_batch(&mut self, inputs: ArrayDynF, expected: &ArrayDynF) -> GenericResult<f64> {
        let mask = ArrayDynF::ones(expected.shape());
        self.train_batch_masked(inputs, expected, &mask)
    }

    /// Execute the following steps to train the model based on **inputs** and the corresponding labels
    /// 1) Evaluate the model output for the given inputs (forward propagation)
    /// 2) Calculate the loss between the output and **expected**, only where **mask** is 1
    /// 3) Calculate the gradient of that loss
    /// 4) Use gradient descent to find the gradients of all parameters in all layers (backwards propagation)
    /// 5) Update all parameters with those gradients
    /// #####
    /// Returns the average loss over the selected outputs
    pub fn train_batch_masked(&mut self, inputs: ArrayDynF, expected: &ArrayDynF, mask: &ArrayDynF) -> GenericResult<f64> {
        self.iterations += 1;
        let config = BatchConfig::new_train_step(self.iterations, self.lr_multiplier);
        let mut assigner = KeyAssigner::new();
        let mut forward_cache = GenericStorage::new();

        let output = forward_layer(
            &self.main_layer,
            ForwardData {
                inputs,
                assigner: &mut assigner,
                storage: &self.storage,
                forward_cache: Some(&mut forward_cache),
                batch_config: &config,
            },
        )?;

        if output.shape() != expected.shape() || mask.shape() != expected.shape() {
            anyhow::bail!("model output {:?} doesn't match labels {:?} and mask {:?}",
                output.shape(), expected.shape(), mask.shape());
        }

        assigner.revert();

        let mut backward_cache = GenericStorage::new();
        let grad = calc_masked_loss_grad(&self.loss, expected, &output, mask);
        let loss_mean = calc_masked_loss(&self.loss, expected, &output, mask);

        backward_layer(
            &self.main_layer,
            BackwardData {
                grad,
                batch_config: &config,
                backward_cache: &mut backward_cache,
                forward_cache: &mut forward_cache,
                storage: &self.storage,
                assigner: &mut assigner,
            },
        )?;

        assigner.revert();

        train_layer(
            &self.main_layer,
            TrainData {
                storage: &mut self.storage,
                batch_config: &config,
                assigner: &mut assigner,
                backward_cache: &mut backward_cache,
            },
        )?;

        Ok(loss_mean)
    }
}

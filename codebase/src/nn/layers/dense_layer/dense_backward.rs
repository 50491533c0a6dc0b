use ndarray::Axis;
use crate::nn::generic_storage::*;
use crate::nn::layers::dense_layer::{DenseConfig, gen_name};
use crate::nn::layers::nn_layers::*;
use crate::utils::{Array2F, GetBatchSize};

/// Calculates the weights' error by performing matrix multiplication between the gradient and the inputs,
/// averaged over the batch.
/// Calculates the biases' error as a mean of the gradient.
/// Outputs the matrix multiplication between the gradient and the weights.
pub fn backward(data: BackwardData, layer_config: &DenseConfig) -> LayerResult {
    let BackwardData {
        assigner,
        storage,
        forward_cache,
        grad,
        backward_cache,
        ..
    } = data;
    let key = assigner.get_key(gen_name(layer_config));

    let [weights] = clone_from_storage1(storage, &key)?;
    let weights: Array2F = weights.into_dimensionality()?;

    let [inputs] = remove_from_storage1(forward_cache, &key)?;
    let inputs: Array2F = inputs.into_dimensionality()?;

    let grad: Array2F = grad.into_dimensionality()?;

    let factor = 1.0 / inputs.batch_size().max(1) as f32;
    let weights_grad = grad.t().dot(&inputs) * factor;
    let biases_grad = grad.sum_axis(Axis(0)) * factor;

    backward_cache.insert(key, vec![weights_grad.into_dyn(), biases_grad.into_dyn()]);

    Ok(grad.dot(&weights).into_dyn())
}

use crate::nn::generic_storage::clone_from_storage2;
use crate::nn::layers::dense_layer::*;
use crate::nn::layers::nn_layers::*;
use crate::utils::{Array1F, Array2F};

pub fn forward(data: ForwardData, layer_config: &DenseConfig) -> LayerResult {
    let ForwardData {
        assigner,
        storage,
        inputs,
        forward_cache,
        ..
    } = data;
    let key = assigner.get_key(gen_name(layer_config));

    let [weights, biases] = clone_from_storage2(storage, &key)?;
    let weights: Array2F = weights.into_dimensionality()?;
    let biases: Array1F = biases.into_dimensionality()?;

    let inputs: Array2F = inputs.into_dimensionality()?;

    // (batch, in) x (in, out) + (out)
    let result = inputs.dot(&weights.t()) + &biases;

    if let Some(forward_cache) = forward_cache {
        forward_cache.insert(key, vec![inputs.into_dyn()]);
    }
    Ok(result.into_dyn())
}

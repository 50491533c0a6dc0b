use anyhow::bail;
use ndarray::parallel::prelude::*;
use ndarray::s;
use crate::Array4F;
use crate::nn::generic_storage::clone_from_storage1;
use crate::nn::layers::filtering::channels_to_rows;
use crate::nn::layers::filtering::convolution::{ConvolutionConfig, gen_name};
use crate::nn::layers::nn_layers::{ForwardData, LayerResult};
use crate::nn::utils::pad4d;
use crate::utils::{Array2F, GenericResult, get_dims_after_filter};

pub fn forward(data: ForwardData, layer_config: &ConvolutionConfig) -> LayerResult {
    let ForwardData { inputs, storage, assigner, forward_cache, .. } = data;
    let key = assigner.get_key(gen_name(layer_config));

    let inputs: Array4F = inputs.into_dimensionality()?;
    let [kernel] = clone_from_storage1(storage, &key)?;
    let kernel: Array4F = kernel.into_dimensionality()?;

    let padded = pad4d(inputs, layer_config.padding, 0.0);
    let result = cpu_forward(&padded, &kernel, layer_config)?;

    if let Some(forward_cache) = forward_cache {
        forward_cache.insert(key, vec![padded.into_dyn()]);
    }

    Ok(result.into_dyn())
}

/// Every kernel element (kh, kw) is a matrix of (OutChannels, InChannels) that multiplies all the
/// input pixels it touches at once. The output is the sum of those products.
pub fn cpu_forward(padded: &Array4F, kernel: &Array4F, layer_config: &ConvolutionConfig) -> GenericResult<Array4F> {
    let window = layer_config.window();
    let shape = padded.shape();
    let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
    if channels != layer_config.in_channels {
        bail!("convolution expected {} channels but got {}", layer_config.in_channels, channels);
    }

    let (new_height, new_width) = get_dims_after_filter(height, width, window.size, window.stride, window.dilation);
    if new_height == 0 || new_width == 0 {
        bail!("input of {}x{} is too small for a window spanning {} pixels", height, width, window.span());
    }

    let kernel_size = layer_config.kernel_size;
    let out_channels = layer_config.out_channels;
    let columns = batch * new_height * new_width;

    let mut parts = Vec::with_capacity(kernel_size * kernel_size);
    (0..kernel_size * kernel_size)
        .into_par_iter()
        .map(|o| (o / kernel_size, o % kernel_size))
        .map(|(kh, kw)| -> GenericResult<Array2F> {
            let rows = channels_to_rows(window.tap(padded, kh, kw, new_height, new_width))?;
            Ok(kernel.slice(s![.., .., kh, kw]).dot(&rows))
        })
        .collect_into_vec(&mut parts);

    // Summed in kernel order, so the result doesn't depend on how the pool split the work
    let mut summed = Array2F::zeros((out_channels, columns));
    for part in parts {
        summed += &part?;
    }

    let result = summed
        .into_shape((out_channels, batch, new_height, new_width))?
        .permuted_axes([1, 0, 2, 3]);
    Ok(result.as_standard_layout().into_owned())
}

use std::ops::AddAssign;
use ndarray::parallel::prelude::*;
use ndarray::s;
use crate::Array4F;
use crate::nn::generic_storage::{clone_from_storage1, remove_from_storage1};
use crate::nn::layers::filtering::channels_to_rows;
use crate::nn::layers::filtering::convolution::{ConvolutionConfig, gen_name};
use crate::nn::layers::nn_layers::{BackwardData, LayerResult};
use crate::nn::utils::remove_padding_4d;
use crate::utils::{Array2F, GenericResult};

pub fn backward(data: BackwardData, layer_config: &ConvolutionConfig) -> LayerResult {
    let BackwardData {
        assigner, forward_cache, storage,
        grad, backward_cache, ..
    } = data;

    let key = assigner.get_key(gen_name(layer_config));

    let [kernel] = clone_from_storage1(storage, &key)?;
    let kernel: Array4F = kernel.into_dimensionality()?;

    let [padded] = remove_from_storage1(forward_cache, &key)?;
    let padded: Array4F = padded.into_dimensionality()?;

    let grad: Array4F = grad.into_dimensionality()?;

    let (kernel_grad, inputs_grad) = cpu_backward(&padded, &grad, &kernel, layer_config)?;
    backward_cache.insert(key, vec![kernel_grad.into_dyn()]);

    Ok(remove_padding_4d(inputs_grad, layer_config.padding).into_dyn())
}

/// Returns the kernel's error averaged over the batch, and the error of the (padded) inputs
pub fn cpu_backward(padded: &Array4F, grad: &Array4F, kernel: &Array4F,
                    layer_config: &ConvolutionConfig) -> GenericResult<(Array4F, Array4F)> {
    let window = layer_config.window();
    let kernel_size = layer_config.kernel_size;
    let grad_shape = grad.shape();
    let (batch, new_height, new_width) = (grad_shape[0], grad_shape[2], grad_shape[3]);
    let in_channels = padded.shape()[1];

    // (OutChannels, Batch * OutHeight * OutWidth)
    let grad_rows = channels_to_rows(grad.view())?;
    let factor = 1.0 / batch.max(1) as f32;

    let mut parts = Vec::with_capacity(kernel_size * kernel_size);
    (0..kernel_size * kernel_size)
        .into_par_iter()
        .map(|o| (o / kernel_size, o % kernel_size))
        .map(|(kh, kw)| -> GenericResult<(Array2F, Array2F)> {
            let rows = channels_to_rows(window.tap(padded, kh, kw, new_height, new_width))?;
            let kernel_part = grad_rows.dot(&rows.t()) * factor;
            let inputs_part = kernel.slice(s![.., .., kh, kw]).t().dot(&grad_rows);
            Ok((kernel_part, inputs_part))
        })
        .collect_into_vec(&mut parts);

    let mut kernel_grad = Array4F::zeros(kernel.raw_dim());
    let mut inputs_grad = Array4F::zeros(padded.raw_dim());
    for (index, part) in parts.into_iter().enumerate() {
        let (kernel_part, inputs_part) = part?;
        let (kh, kw) = (index / kernel_size, index % kernel_size);

        kernel_grad.slice_mut(s![.., .., kh, kw]).assign(&kernel_part);

        let inputs_part = inputs_part
            .into_shape((in_channels, batch, new_height, new_width))?
            .permuted_axes([1, 0, 2, 3]);
        window.tap_mut(&mut inputs_grad, kh, kw, new_height, new_width).add_assign(&inputs_part);
    }

    Ok((kernel_grad, inputs_grad))
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;
    use crate::nn::layers::filtering::convolution::conv_forward::cpu_forward;
    use crate::nn::layers::filtering::convolution::tests::get_config;
    use crate::nn::utils::pad4d;
    use super::*;

    /// Compares the analytic gradients with finite differences of sum(forward(x) * grad)
    fn check_gradients(config: ConvolutionConfig, height: usize, width: usize) {
        let dist = Normal::new(0.0, 1.0).unwrap();
        let inputs = Array4F::random((2, config.in_channels, height, width), dist);
        let kernel = Array4F::random((config.out_channels, config.in_channels, config.kernel_size, config.kernel_size), dist);
        let padded = pad4d(inputs.clone(), config.padding, 0.0);
        let out = cpu_forward(&padded, &kernel, &config).unwrap();
        let grad = Array4F::random(out.raw_dim(), dist);

        let (kernel_grad, inputs_grad) = cpu_backward(&padded, &grad, &kernel, &config).unwrap();
        let inputs_grad = remove_padding_4d(inputs_grad, config.padding);
        assert_eq!(inputs_grad.shape(), inputs.shape());

        let objective = |inputs: &Array4F, kernel: &Array4F| -> f32 {
            let padded = pad4d(inputs.clone(), config.padding, 0.0);
            (cpu_forward(&padded, kernel, &config).unwrap() * &grad).sum()
        };
        let delta = 0.1;

        for index in [(0, 0, 0, 0), (1, config.in_channels - 1, height - 1, width / 2), (0, 0, height / 2, 1)] {
            let mut plus = inputs.clone();
            plus[index] += delta;
            let mut minus = inputs.clone();
            minus[index] -= delta;
            let numeric = (objective(&plus, &kernel) - objective(&minus, &kernel)) / (2.0 * delta);
            assert!((numeric - inputs_grad[index]).abs() < 1e-2, "{} {}", numeric, inputs_grad[index]);
        }

        for index in [(0, 0, 0, 0), (config.out_channels - 1, config.in_channels - 1, config.kernel_size - 1, 1)] {
            let mut plus = kernel.clone();
            plus[index] += delta;
            let mut minus = kernel.clone();
            minus[index] -= delta;
            // Kernel error is averaged over the batch of 2
            let numeric = (objective(&inputs, &plus) - objective(&inputs, &minus)) / (2.0 * delta) / 2.0;
            assert!((numeric - kernel_grad[index]).abs() < 1e-2, "{} {}", numeric, kernel_grad[index]);
        }
    }

    #[test]
    fn test_gradients_plain() {
        check_gradients(get_config(2, 3, 3, 1, 0), 5, 5);
    }

    #[test]
    fn test_gradients_stride_padding() {
        check_gradients(get_config(3, 2, 3, 2, 1), 6, 7);
    }

    #[test]
    fn test_gradients_dilated() {
        let mut config = get_config(2, 2, 3, 1, 2);
        config.dilation = 2;
        check_gradients(config, 6, 6);
    }
}

use anyhow::bail;
use ndarray::Zip;
use crate::Array4F;
use crate::nn::layers::filtering::max_pool::{gen_name, MaxPoolConfig};
use crate::nn::layers::nn_layers::{ForwardData, LayerResult};
use crate::nn::utils::pad4d;
use crate::utils::{GenericResult, get_dims_after_filter};

pub fn forward(data: ForwardData, layer_config: &MaxPoolConfig) -> LayerResult {
    let ForwardData { inputs, forward_cache, assigner, .. } = data;

    let key = assigner.get_key(gen_name());
    let inputs: Array4F = inputs.into_dimensionality()?;
    let padded = pad4d(inputs, layer_config.padding, f32::NEG_INFINITY);

    let result = forward_cpu(&padded, layer_config)?;
    if let Some(forward_cache) = forward_cache {
        forward_cache.insert(key, vec![padded.into_dyn()]);
    }

    Ok(result.into_dyn())
}

pub(super) fn forward_cpu(padded: &Array4F, layer_config: &MaxPoolConfig) -> GenericResult<Array4F> {
    let window = layer_config.window();
    let shape = padded.shape();
    let (new_height, new_width) = get_dims_after_filter(shape[2], shape[3], window.size, window.stride, 1);
    if new_height == 0 || new_width == 0 {
        bail!("input of {}x{} is too small for max pooling of size {}", shape[2], shape[3], window.size);
    }

    let mut result = Array4F::from_elem((shape[0], shape[1], new_height, new_width), f32::NEG_INFINITY);
    for kh in 0..window.size {
        for kw in 0..window.size {
            Zip::from(&mut result)
                .and(&window.tap(padded, kh, kw, new_height, new_width))
                .par_for_each(|r, &v| *r = r.max(v));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::nn::batch_config::BatchConfig;
    use crate::nn::key_assigner::KeyAssigner;
    use crate::nn::layers::filtering::max_pool::tests::{create_forward_outputs, create_inputs};
    use crate::nn::layers::nn_layers::GenericStorage;
    use crate::utils::ArrayDynF;
    use super::*;

    #[test]
    fn test_forward_2x2() {
        let inputs = create_inputs();
        let expected = create_forward_outputs();

        fn action(inputs: ArrayDynF, size: usize, stride: usize) -> ArrayDynF {
            forward(ForwardData {
                inputs,
                batch_config: &BatchConfig::new_train(),
                assigner: &mut KeyAssigner::new(),
                storage: &GenericStorage::new(),
                forward_cache: None,
            }, &MaxPoolConfig { size, stride, padding: 0 }).unwrap()
        }

        assert_eq!(expected, action(inputs, 2, 2));
    }

    #[test]
    fn test_padding_never_wins() {
        let inputs = Array4F::from_elem((1, 1, 4, 4), -5.0);
        let padded = pad4d(inputs, 1, f32::NEG_INFINITY);
        let result = forward_cpu(&padded, &MaxPoolConfig { size: 3, stride: 2, padding: 1 }).unwrap();
        assert_eq!(result.shape(), &[1, 1, 2, 2]);
        assert!(result.iter().all(|&o| o == -5.0));
    }
}

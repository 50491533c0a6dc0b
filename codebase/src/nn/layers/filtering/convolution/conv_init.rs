use anyhow::bail;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use crate::Array4F;
use crate::nn::layers::filtering::convolution::{ConvolutionConfig, ConvolutionInitMode, gen_name};
use crate::nn::layers::nn_layers::{EmptyLayerResult, InitData};

pub fn init(data: InitData, layer_config: &ConvolutionConfig) -> EmptyLayerResult {
    let InitData { assigner, storage, rng } = data;
    let ConvolutionConfig { in_channels, out_channels, kernel_size, init_mode, .. } = layer_config.clone();
    let key = assigner.get_key(gen_name(layer_config));

    if let std::collections::hash_map::Entry::Vacant(e) = storage.entry(key) {
        let kernel = match init_mode {
            ConvolutionInitMode::Kernel(k) => {
                if k.shape() != [out_channels, in_channels, kernel_size, kernel_size] {
                    bail!("kernel of shape {:?} doesn't match {}x{}x{}x{}", k.shape(), out_channels, in_channels, kernel_size, kernel_size);
                }
                k
            }
            ConvolutionInitMode::HeNormal() => {
                let fan_in = in_channels * kernel_size * kernel_size;
                let std_dev = (2.0 / fan_in as f32).sqrt();
                let dist = Normal::new(0.0, std_dev)?;
                Array4F::random_using((out_channels, in_channels, kernel_size, kernel_size), dist, rng)
            }
        };

        e.insert(vec![kernel.into_dyn()]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::nn::key_assigner::KeyAssigner;
    use crate::nn::layers::filtering::convolution::tests::get_config;
    use crate::nn::layers::nn_layers::GenericStorage;
    use super::*;

    #[test]
    fn test_init() {
        let config = get_config(1, 4, 3, 1, 0);

        let mut assigner = KeyAssigner::new();
        let mut storage = GenericStorage::new();
        let data = InitData {
            assigner: &mut assigner,
            storage: &mut storage,
            rng: &mut StdRng::seed_from_u64(0),
        };
        init(data, &config).unwrap();
        assert_eq!(storage["conv_3x3_4_0"][0].shape(), &[4, 1, 3, 3]);
    }

    #[test]
    fn test_init_rejects_wrong_kernel() {
        let mut config = get_config(2, 4, 3, 1, 0);
        config.init_mode = ConvolutionInitMode::Kernel(Array4F::zeros((4, 3, 3, 3)));

        let mut storage = GenericStorage::new();
        let result = init(InitData { assigner: &mut KeyAssigner::new(), storage: &mut storage, rng: &mut StdRng::seed_from_u64(0) }, &config);
        assert!(result.is_err());
    }
}

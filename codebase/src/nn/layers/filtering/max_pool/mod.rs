mod max_pool_forward;

use ndarray::Zip;
use crate::Array4F;
use crate::nn::generic_storage::remove_from_storage1;
use crate::nn::layers::filtering::Window;
use crate::nn::layers::nn_layers::{BackwardData, EmptyLayerResult, ForwardData, InitData, LayerOps, LayerResult};
use crate::nn::utils::remove_padding_4d;

#[derive(Clone, Debug)]
pub struct MaxPoolConfig {
    pub size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl MaxPoolConfig {
    pub(crate) fn window(&self) -> Window {
        Window { size: self.size, stride: self.stride, dilation: 1 }
    }
}

pub struct MaxPoolLayer;

fn gen_name() -> String {
    "max_pool".to_owned()
}

impl LayerOps<MaxPoolConfig> for MaxPoolLayer {
    fn init(_: InitData, _: &MaxPoolConfig) -> EmptyLayerResult { Ok(()) }

    fn forward(data: ForwardData, layer_config: &MaxPoolConfig) -> LayerResult {
        max_pool_forward::forward(data, layer_config)
    }

    /// The gradient of each output goes to the first input of its window holding the maximum
    fn backward(data: BackwardData, layer_config: &MaxPoolConfig) -> LayerResult {
        let BackwardData { forward_cache, assigner, grad, .. } = data;
        let grad: Array4F = grad.into_dimensionality()?;

        let key = assigner.get_key(gen_name());
        let [padded] = remove_from_storage1(forward_cache, &key)?;
        let padded: Array4F = padded.into_dimensionality()?;

        let window = layer_config.window();
        let (new_height, new_width) = (grad.shape()[2], grad.shape()[3]);

        let mut best = Array4F::from_elem(grad.raw_dim(), f32::NEG_INFINITY);
        let mut best_tap = ndarray::Array4::<usize>::zeros(grad.raw_dim());
        for tap in 0..window.size * window.size {
            let values = window.tap(&padded, tap / window.size, tap % window.size, new_height, new_width);
            Zip::from(&mut best)
                .and(&mut best_tap)
                .and(&values)
                .for_each(|b, t, &v| if v > *b {
                    *b = v;
                    *t = tap;
                });
        }

        let mut result = Array4F::zeros(padded.raw_dim());
        for tap in 0..window.size * window.size {
            let mut area = window.tap_mut(&mut result, tap / window.size, tap % window.size, new_height, new_width);
            Zip::from(&mut area)
                .and(&best_tap)
                .and(&grad)
                .for_each(|r, &t, &g| if t == tap {
                    *r += g;
                });
        }

        Ok(remove_padding_4d(result, layer_config.padding).into_dyn())
    }
}

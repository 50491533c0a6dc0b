use ndarray::Axis;
use crate::nn::generic_storage::remove_from_storage1;
use crate::nn::layers::nn_layers::*;
use crate::utils::{Array1F, Array2F, Array4F};

pub(crate) struct GlobalAvgPoolLayer;

fn gen_name() -> String {
    "global_avg_pool".to_owned()
}

impl LayerOps<()> for GlobalAvgPoolLayer {
    fn init(_: InitData, _: &()) -> EmptyLayerResult { Ok(()) }

    fn forward(data: ForwardData, _: &()) -> LayerResult {
        let ForwardData { assigner, inputs, forward_cache, .. } = data;
        let key = assigner.get_key(gen_name());

        let inputs: Array4F = inputs.into_dimensionality()?;
        let (height, width) = (inputs.shape()[2], inputs.shape()[3]);
        let area = (height * width).max(1) as f32;
        let result = inputs.sum_axis(Axis(3)).sum_axis(Axis(2)) / area;

        if let Some(forward_cache) = forward_cache {
            forward_cache.insert(key, vec![Array1F::from(vec![height as f32, width as f32]).into_dyn()]);
        }
        Ok(result.into_dyn())
    }

    fn backward(data: BackwardData, _: &()) -> LayerResult {
        let BackwardData { assigner, forward_cache, grad, .. } = data;
        let key = assigner.get_key(gen_name());

        let [size] = remove_from_storage1(forward_cache, &key)?;
        let (height, width) = (size[0] as usize, size[1] as usize);
        let grad: Array2F = grad.into_dimensionality()?;
        let (batch, channels) = (grad.shape()[0], grad.shape()[1]);

        let spread = grad / (height * width).max(1) as f32;
        let result = spread
            .insert_axis(Axis(2))
            .insert_axis(Axis(3))
            .broadcast((batch, channels, height, width))
            .map(|o| o.to_owned());
        match result {
            Some(v) => Ok(v.into_dyn()),
            None => Err(anyhow::anyhow!("can't spread gradient of shape {:?}", [batch, channels])),
        }
    }
}

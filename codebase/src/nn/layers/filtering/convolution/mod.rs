use crate::Array4F;
use crate::nn::layers::filtering::Window;
use crate::nn::layers::nn_layers::{BackwardData, EmptyLayerResult, ForwardData, InitData, LayerOps, LayerResult};
use crate::nn::lr_calculators::lr_calculator::LrCalc;

mod conv_forward;
mod conv_init;
mod conv_backward;
mod conv_train;

#[derive(Clone, Debug)]
pub struct ConvolutionConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
    pub init_mode: ConvolutionInitMode,
    pub lr_calc: LrCalc,
    /// L2 penalty factor applied to the kernel
    pub l2_reg: f32,
}

#[derive(Clone, Debug)]
pub enum ConvolutionInitMode {
    Kernel(Array4F),
    HeNormal(),
}

impl ConvolutionConfig {
    pub(crate) fn window(&self) -> Window {
        Window { size: self.kernel_size, stride: self.stride, dilation: self.dilation.max(1) }
    }
}

pub struct ConvolutionLayer;

/// The number of input channels is not part of the name, so a kernel can be matched with
/// pretrained weights that were made for a different number of bands.
pub fn gen_name(config: &ConvolutionConfig) -> String {
    format!("conv_{}x{}_{}", config.kernel_size, config.kernel_size, config.out_channels)
}

impl LayerOps<ConvolutionConfig> for ConvolutionLayer {
    fn init(data: InitData, layer_config: &ConvolutionConfig) -> EmptyLayerResult {
        conv_init::init(data, layer_config)
    }

    fn forward(data: ForwardData, layer_config: &ConvolutionConfig) -> LayerResult {
        conv_forward::forward(data, layer_config)
    }

    fn backward(data: BackwardData, layer_config: &ConvolutionConfig) -> LayerResult {
        conv_backward::backward(data, layer_config)
    }
}

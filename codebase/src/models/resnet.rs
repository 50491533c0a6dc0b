use anyhow::bail;
use crate::nn::layers::batch_norm_layer::BatchNormConfig;
use crate::nn::layers::dense_layer::{DenseConfig, DenseLayerInit};
use crate::nn::layers::filtering::convolution::{self, ConvolutionConfig, ConvolutionInitMode};
use crate::nn::layers::filtering::max_pool::MaxPoolConfig;
use crate::nn::layers::nn_layers::Layer;
use crate::nn::layers::residual_layer::ResidualConfig;
use crate::nn::layers::sequential_layer::SequentialConfig;
use crate::nn::lr_calculators::adam_lr::AdamConfig;
use crate::nn::lr_calculators::lr_calculator::LrCalc;
use crate::utils::GenericResult;

const BOTTLENECK_EXPANSION: usize = 4;

/// Hyper-parameters of the hyperspectral ResNet
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParams {
    /// L2 penalty of the final dense layer
    pub fc_reg: f32,
    /// L2 penalty of every convolution
    pub conv_reg: f32,
    pub num_layers: usize,
    pub use_dilated_conv_in_first_layer: bool,
    pub num_input_bands: usize,
    pub num_outputs: usize,
    /// Width of the first stage, doubled by every following stage
    pub base_channels: usize,
    pub lr: f32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BlockKind {
    Basic,
    Bottleneck,
}

fn blocks_for(num_layers: usize) -> GenericResult<(BlockKind, [usize; 4])> {
    match num_layers {
        18 => Ok((BlockKind::Basic, [2, 2, 2, 2])),
        34 => Ok((BlockKind::Basic, [3, 4, 6, 3])),
        50 => Ok((BlockKind::Bottleneck, [3, 4, 6, 3])),
        _ => bail!("unsupported ResNet depth {}, expected 18, 34 or 50", num_layers),
    }
}

struct Builder<'a> {
    params: &'a ModelParams,
}

impl<'a> Builder<'a> {
    fn lr_calc(&self) -> LrCalc {
        LrCalc::Adam(AdamConfig::with_lr(self.params.lr))
    }

    fn conv(&self, in_channels: usize, out_channels: usize, kernel_size: usize, stride: usize) -> Layer {
        Layer::Convolution(ConvolutionConfig {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding: kernel_size / 2,
            dilation: 1,
            init_mode: ConvolutionInitMode::HeNormal(),
            lr_calc: self.lr_calc(),
            l2_reg: self.params.conv_reg,
        })
    }

    fn batch_norm(&self, channels: usize) -> Layer {
        Layer::BatchNorm(BatchNormConfig::new(channels, self.lr_calc()))
    }

    fn stem(&self) -> Layer {
        let dilation = if self.params.use_dilated_conv_in_first_layer { 2 } else { 1 };
        Layer::Sequential(SequentialConfig {
            layers: vec![
                Layer::Convolution(ConvolutionConfig {
                    in_channels: self.params.num_input_bands,
                    out_channels: self.params.base_channels,
                    kernel_size: 7,
                    stride: 2,
                    padding: 3 * dilation,
                    dilation,
                    init_mode: ConvolutionInitMode::HeNormal(),
                    lr_calc: self.lr_calc(),
                    l2_reg: self.params.conv_reg,
                }),
                self.batch_norm(self.params.base_channels),
                Layer::Relu,
                Layer::MaxPool(MaxPoolConfig { size: 3, stride: 2, padding: 1 }),
            ]
        })
    }

    fn projection(&self, in_channels: usize, out_channels: usize, stride: usize) -> Option<Box<Layer>> {
        if stride == 1 && in_channels == out_channels {
            return None;
        }
        Some(Box::new(Layer::Sequential(SequentialConfig {
            layers: vec![
                self.conv(in_channels, out_channels, 1, stride),
                self.batch_norm(out_channels),
            ]
        })))
    }

    fn basic_block(&self, in_channels: usize, out_channels: usize, stride: usize) -> Layer {
        let main = Layer::Sequential(SequentialConfig {
            layers: vec![
                self.conv(in_channels, out_channels, 3, stride),
                self.batch_norm(out_channels),
                Layer::Relu,
                self.conv(out_channels, out_channels, 3, 1),
                self.batch_norm(out_channels),
            ]
        });
        Layer::Residual(ResidualConfig {
            main: Box::new(main),
            shortcut: self.projection(in_channels, out_channels, stride),
        })
    }

    fn bottleneck_block(&self, in_channels: usize, channels: usize, stride: usize) -> Layer {
        let out_channels = channels * BOTTLENECK_EXPANSION;
        let main = Layer::Sequential(SequentialConfig {
            layers: vec![
                self.conv(in_channels, channels, 1, 1),
                self.batch_norm(channels),
                Layer::Relu,
                self.conv(channels, channels, 3, stride),
                self.batch_norm(channels),
                Layer::Relu,
                self.conv(channels, out_channels, 1, 1),
                self.batch_norm(out_channels),
            ]
        });
        Layer::Residual(ResidualConfig {
            main: Box::new(main),
            shortcut: self.projection(in_channels, out_channels, stride),
        })
    }
}

/// Builds the model: a 7x7 stem, four stages of residual blocks and a dense regression head
/// on globally pooled features. Outputs (Batch, num_outputs).
pub fn build_resnet(params: &ModelParams) -> GenericResult<Layer> {
    if params.num_input_bands == 0 {
        bail!("the model needs at least one input band");
    }
    if params.base_channels == 0 || params.num_outputs == 0 {
        bail!("base_channels and num_outputs must be positive");
    }
    let (kind, blocks) = blocks_for(params.num_layers)?;
    let builder = Builder { params };

    let mut layers = vec![builder.stem()];
    let mut in_channels = params.base_channels;
    for (stage, count) in blocks.iter().enumerate() {
        let channels = params.base_channels << stage;
        for index in 0..*count {
            let stride = if stage > 0 && index == 0 { 2 } else { 1 };
            let block = match kind {
                BlockKind::Basic => builder.basic_block(in_channels, channels, stride),
                BlockKind::Bottleneck => builder.bottleneck_block(in_channels, channels, stride),
            };
            layers.push(block);
            layers.push(Layer::Relu);
            in_channels = match kind {
                BlockKind::Basic => channels,
                BlockKind::Bottleneck => channels * BOTTLENECK_EXPANSION,
            };
        }
    }

    layers.push(Layer::GlobalAvgPool);
    layers.push(Layer::Dense(DenseConfig {
        in_values: in_channels,
        out_values: params.num_outputs,
        init_mode: DenseLayerInit::Random(),
        weights_lr_calc: builder.lr_calc(),
        biases_lr_calc: builder.lr_calc(),
        l2_reg: params.fc_reg,
    }));

    Ok(Layer::Sequential(SequentialConfig { layers }))
}

/// Storage key of the stem convolution, the only kernel that depends on the number of bands
pub fn first_conv_key(params: &ModelParams) -> String {
    let stem = ConvolutionConfig {
        in_channels: params.num_input_bands,
        out_channels: params.base_channels,
        kernel_size: 7,
        stride: 2,
        padding: 3,
        dilation: 1,
        init_mode: ConvolutionInitMode::HeNormal(),
        lr_calc: LrCalc::Adam(AdamConfig::default()),
        l2_reg: 0.0,
    };
    format!("{}_0", convolution::gen_name(&stem))
}

/// Prefix of the storage keys of the final (regression) layer
pub fn final_layer_prefix() -> &'static str {
    "dense_"
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::RandomExt;
    use crate::nn::batch_config::ForwardMode;
    use crate::nn::controller::NNController;
    use crate::nn::loss::loss_func::LossFunc;
    use crate::utils::{Array1F, Array4F};
    use super::*;

    fn params(num_layers: usize) -> ModelParams {
        ModelParams {
            fc_reg: 1e-3,
            conv_reg: 1e-3,
            num_layers,
            use_dilated_conv_in_first_layer: false,
            num_input_bands: 3,
            num_outputs: 2,
            base_channels: 2,
            lr: 1e-3,
        }
    }

    fn count_convs(layer: &Layer) -> usize {
        match layer {
            Layer::Convolution(_) => 1,
            Layer::Sequential(c) => c.layers.iter().map(count_convs).sum(),
            Layer::Residual(c) => count_convs(&c.main) + c.shortcut.as_deref().map(count_convs).unwrap_or(0),
            _ => 0,
        }
    }

    #[test]
    fn test_depths() {
        // Main path convolutions plus the stem, and 3 projections
        assert_eq!(count_convs(&build_resnet(&params(18)).unwrap()), 17 + 3);
        assert_eq!(count_convs(&build_resnet(&params(34)).unwrap()), 33 + 3);
        // Bottlenecks also project in the first stage
        assert_eq!(count_convs(&build_resnet(&params(50)).unwrap()), 49 + 4);
        assert!(build_resnet(&params(20)).is_err());
    }

    #[test]
    fn test_zero_bands_is_error() {
        let mut params = params(18);
        params.num_input_bands = 0;
        assert!(build_resnet(&params).is_err());
    }

    #[test]
    fn test_forward_and_train_small_images() {
        for dilated in [false, true] {
            let mut params = params(18);
            params.use_dilated_conv_in_first_layer = dilated;
            let mut controller = NNController::new(build_resnet(&params).unwrap(), LossFunc::Mse).unwrap();
            assert!(controller.storage().contains_key(&first_conv_key(&params)));

            let inputs = Array4F::random((3, 3, 8, 8), Normal::new(0.0, 1.0).unwrap()).into_dyn();
            let output = controller.forward(inputs.clone(), ForwardMode::Eval).unwrap();
            assert_eq!(output.shape(), &[3, 2]);

            let expected = ndarray::Array2::<f32>::ones((3, 2)).into_dyn();
            let loss = controller.train_batch(inputs, &expected).unwrap();
            assert!(loss.is_finite());
        }
    }

    #[test]
    fn test_final_layer_key() {
        let controller = NNController::new(build_resnet(&params(18)).unwrap(), LossFunc::Mse).unwrap();
        let dense: Vec<_> = controller.storage().keys().filter(|o| o.starts_with(final_layer_prefix())).collect();
        assert_eq!(dense, vec!["dense_16_2_0"]);
        let biases: Array1F = controller.storage()["dense_16_2_0"][1].clone().into_dimensionality().unwrap();
        assert_eq!(biases.len(), 2);
    }
}

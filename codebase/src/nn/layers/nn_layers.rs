use std::collections::HashMap;
use rand::rngs::StdRng;
use crate::nn::batch_config::BatchConfig;
use crate::nn::key_assigner::KeyAssigner;
use crate::nn::layers::*;
use crate::nn::layers::activation::*;
use crate::nn::layers::filtering::convolution::{self, ConvolutionConfig};
use crate::nn::layers::filtering::max_pool::{self, MaxPoolConfig};
use crate::utils::{ArrayDynF, GenericResult};

/// Enum to represent the layers that create the model and its parameters
#[derive(Clone, Debug)]
pub enum Layer {
    /// Dense Layer: perform matrix multiplication between the input and a weights matrix, and add
    /// a biases matrix.
    /// ### Trainable
    /// * Weights
    /// * Biases
    Dense(dense_layer::DenseConfig),

    /// Simply executes the layers in sequential order, passing the output of a layer as the input
    /// of the next layer. Will probably be the **root** of the model.
    Sequential(sequential_layer::SequentialConfig),

    /// Apply the Rectified Linear Unit (ReLu) activation function. That means:
    /// * For x >= 0: x
    /// * For x < 0: 0
    Relu,

    /// Apply the convolution operation with 2D filters. That means passing a filter through the last
    /// 2 dimension of the input (usually height and width). In position of the filter, the sum of the
    /// product of those input values and the kernel is computed. Requires a 4 dimensional input (one being
    /// the batch). Supports zero padding, stride and dilation.
    /// ### Trainable
    /// * Kernel
    /// https://en.wikipedia.org/wiki/Convolutional_neural_network
    Convolution(ConvolutionConfig),

    /// Normalize every channel with the statistics of the batch while training, and with running
    /// averages of those statistics otherwise.
    /// ### Trainable
    /// * Gamma (scale)
    /// * Beta (shift)
    /// https://arxiv.org/abs/1502.03167
    BatchNorm(batch_norm_layer::BatchNormConfig),

    /// Apply MAX operation with 2D filters, That means passing a filter through the last
    /// 2 dimension of the input (usually height and width). In position of the filter, the maximum
    /// value of those input values is computed. Requires a 4 dimensional input (one being the batch).
    /// Use for reducing the size of arrays after **Convolution**.
    /// https://deepai.org/machine-learning-glossary-and-terms/max-pooling
    MaxPool(MaxPoolConfig),

    /// Average each channel over height and width: (Batch, C, H, W) -> (Batch, C). Used to pass
    /// **Convolution** results into **Dense** layers.
    GlobalAvgPool,

    /// Sum the output of the main path with the shortcut path (identity, or a projection when the
    /// shapes differ). The building block of ResNets.
    /// https://arxiv.org/abs/1512.03385
    Residual(residual_layer::ResidualConfig),
}

pub struct InitData<'a> {
    pub assigner: &'a mut KeyAssigner,
    pub storage: &'a mut GenericStorage,
    /// Source of every random parameter, so that a seed reproduces the whole model
    pub rng: &'a mut StdRng,
}

pub struct ForwardData<'a> {
    pub inputs: ArrayDynF,
    pub batch_config: &'a BatchConfig,
    pub assigner: &'a mut KeyAssigner,
    pub storage: &'a GenericStorage,
    /// Only present when a backward pass will follow
    pub forward_cache: Option<&'a mut GenericStorage>,
}

pub struct BackwardData<'a> {
    pub grad: ArrayDynF,
    pub batch_config: &'a BatchConfig,
    pub assigner: &'a mut KeyAssigner,
    pub storage: &'a GenericStorage,
    pub forward_cache: &'a mut GenericStorage,
    pub backward_cache: &'a mut GenericStorage,
}

pub struct TrainData<'a> {
    pub batch_config: &'a BatchConfig,
    pub assigner: &'a mut KeyAssigner,
    pub storage: &'a mut GenericStorage,
    pub backward_cache: &'a mut GenericStorage,
}

/// Type alias for a map on which layers store all the needed data.
/// Key: unique string for a layer
/// Value: Vector of NDimensional arrays
/// The purpose of this type is to provide a centralized storage for trainable parameters
/// as opposed to the objected oriented approach where layers are classes that stores parameters as fields.
/// The advantage is that it can be easily serialized, and most of the times, layers can be added or
/// removed without progress loss
pub type GenericStorage = HashMap<String, Vec<ArrayDynF>>;

pub type EmptyLayerResult = GenericResult<()>;
pub type LayerResult = GenericResult<ArrayDynF>;

pub trait LayerOps<T> {
    fn init(data: InitData, layer_config: &T) -> EmptyLayerResult;

    fn forward(data: ForwardData, layer_config: &T) -> LayerResult;

    fn backward(data: BackwardData, layer_config: &T) -> LayerResult;
}

pub trait TrainableLayerOps<T> {
    fn train(data: TrainData, layer_config: &T) -> EmptyLayerResult;
}

/// Call **init** in the appropriate layer. Not intended to be called directly.
pub fn init_layer(layer: &Layer, data: InitData) -> EmptyLayerResult {
    use Layer::*;
    match layer {
        Dense(c) => dense_layer::DenseLayer::init(data, c),
        Relu => relu_layer::ReluLayer::init(data, &()),
        Sequential(c) => sequential_layer::SequentialLayer::init(data, c),
        Convolution(c) => convolution::ConvolutionLayer::init(data, c),
        BatchNorm(c) => batch_norm_layer::BatchNormLayer::init(data, c),
        MaxPool(c) => max_pool::MaxPoolLayer::init(data, c),
        GlobalAvgPool => global_pool_layer::GlobalAvgPoolLayer::init(data, &()),
        Residual(c) => residual_layer::ResidualLayer::init(data, c),
    }
}

/// Call **forward** in the appropriate layer. Not intended to be called directly.
pub fn forward_layer(layer: &Layer, data: ForwardData) -> LayerResult {
    use Layer::*;
    match layer {
        Dense(c) => dense_layer::DenseLayer::forward(data, c),
        Sequential(c) => sequential_layer::SequentialLayer::forward(data, c),
        Relu => relu_layer::ReluLayer::forward(data, &()),
        Convolution(c) => convolution::ConvolutionLayer::forward(data, c),
        BatchNorm(c) => batch_norm_layer::BatchNormLayer::forward(data, c),
        MaxPool(c) => max_pool::MaxPoolLayer::forward(data, c),
        GlobalAvgPool => global_pool_layer::GlobalAvgPoolLayer::forward(data, &()),
        Residual(c) => residual_layer::ResidualLayer::forward(data, c),
    }
}

/// Call **backward** in the appropriate layer. Not intended to be called directly.
pub fn backward_layer(layer: &Layer, data: BackwardData) -> LayerResult {
    use Layer::*;
    match layer {
        Dense(c) => dense_layer::DenseLayer::backward(data, c),
        Sequential(c) => sequential_layer::SequentialLayer::backward(data, c),
        Relu => relu_layer::ReluLayer::backward(data, &()),
        Convolution(c) => convolution::ConvolutionLayer::backward(data, c),
        BatchNorm(c) => batch_norm_layer::BatchNormLayer::backward(data, c),
        MaxPool(c) => max_pool::MaxPoolLayer::backward(data, c),
        GlobalAvgPool => global_pool_layer::GlobalAvgPoolLayer::backward(data, &()),
        Residual(c) => residual_layer::ResidualLayer::backward(data, c),
    }
}

/// Call **train** in the appropriate layer. If the layer doesn't provide an implementation, nothing
/// will happen. Not intended to be called directly.
pub fn train_layer(layer: &Layer, data: TrainData) -> EmptyLayerResult {
    use Layer::*;
    match layer {
        Dense(c) => dense_layer::DenseLayer::train(data, c),
        Sequential(c) => sequential_layer::SequentialLayer::train(data, c),
        Convolution(c) => convolution::ConvolutionLayer::train(data, c),
        BatchNorm(c) => batch_norm_layer::BatchNormLayer::train(data, c),
        Residual(c) => residual_layer::ResidualLayer::train(data, c),
        _ => Ok(()),
    }
}

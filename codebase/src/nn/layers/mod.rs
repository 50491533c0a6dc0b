pub mod dense_layer;
pub mod sequential_layer;
pub mod activation;
pub mod nn_layers;
pub mod filtering;
pub mod batch_norm_layer;
pub mod global_pool_layer;
pub mod residual_layer;

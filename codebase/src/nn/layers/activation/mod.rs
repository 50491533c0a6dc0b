pub mod relu_layer;

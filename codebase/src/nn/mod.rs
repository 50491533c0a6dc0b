pub mod layers;
pub mod batch_config;
pub mod loss;
pub mod controller;
pub mod lr_calculators;
pub mod key_assigner;
pub mod generic_storage;
pub mod utils;

pub mod lr_calculator;
pub mod constant_lr;
pub mod adam_lr;

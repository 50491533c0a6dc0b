pub mod loss_func;
pub mod mse_loss;

use crate::nn::loss::mse_loss::MseLossFunc;
use crate::utils::ArrayDynF;

/// The gradient points towards **expected**, so layers add it to their parameters
pub trait LossFuncOps {
    fn calc_loss(expected: &ArrayDynF, actual: &ArrayDynF) -> ArrayDynF;
    fn calc_loss_grad(expected: &ArrayDynF, actual: &ArrayDynF) -> ArrayDynF;
}

#[derive(Clone, Debug)]
pub enum LossFunc {
    Mse
}

pub fn calc_loss(layer: &LossFunc, expected: &ArrayDynF, actual: &ArrayDynF) -> ArrayDynF {
    use LossFunc::*;
    match layer {
        Mse => MseLossFunc::calc_loss(expected, actual)
    }
}

pub fn calc_loss_grad(layer: &LossFunc, expected: &ArrayDynF, actual: &ArrayDynF) -> ArrayDynF {
    use LossFunc::*;
    match layer {
        Mse => MseLossFunc::calc_loss_grad(expected, actual)
    }
}

/// Mean of the loss over the entries where **mask** is 1. Used when every example only has a
/// label for some of the outputs.
pub fn calc_masked_loss(layer: &LossFunc, expected: &ArrayDynF, actual: &ArrayDynF, mask: &ArrayDynF) -> f64 {
    let count = mask.sum() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let loss = calc_loss(layer, expected, actual) * mask;
    loss.mapv(|o| o as f64).sum() / count
}

/// Gradient that is zero where **mask** is 0
pub fn calc_masked_loss_grad(layer: &LossFunc, expected: &ArrayDynF, actual: &ArrayDynF, mask: &ArrayDynF) -> ArrayDynF {
    calc_loss_grad(layer, expected, actual) * mask
}

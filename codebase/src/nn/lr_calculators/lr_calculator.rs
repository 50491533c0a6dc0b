use crate::nn::batch_config::BatchConfig;
use crate::nn::key_assigner::KeyAssigner;
use crate::nn::layers::nn_layers::{GenericStorage, LayerResult};
use crate::nn::lr_calculators::adam_lr::{AdamConfig, AdamLrCalc};
use crate::nn::lr_calculators::constant_lr::{ConstantLr, ConstantLrConfig};
use crate::utils::ArrayDynF;

pub struct LrCalcData<'a> {
    pub batch_config: &'a BatchConfig,
    pub assigner: &'a mut KeyAssigner,
    pub storage: &'a mut GenericStorage
}

/// Turns a gradient into the delta that is added to a parameter
#[derive(Clone, Debug)]
pub enum LrCalc {
    Constant(ConstantLrConfig),
    Adam(AdamConfig)
}

pub trait LrCalcOps<T> {
    fn apply(target: ArrayDynF, data: LrCalcData, config: &T) -> LayerResult;
}

pub fn apply_lr_calc(calc: &LrCalc, target: ArrayDynF, data: LrCalcData) -> LayerResult {
    match calc {
        LrCalc::Constant(c) => ConstantLr::apply(target, data, c),
        LrCalc::Adam(c) => AdamLrCalc::apply(target, data, c)
    }
}

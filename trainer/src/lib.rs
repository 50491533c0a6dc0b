//! Training of ResNet models estimating nightlights from daytime satellite imagery

pub mod context;
pub mod dataset;
pub mod errors;
pub mod flags;
pub mod metrics;
pub mod nl_preds;
pub mod run;
pub mod run_config;
pub mod trainer;
pub mod weights;

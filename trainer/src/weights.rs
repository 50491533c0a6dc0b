use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use itertools::Itertools;
use log::{debug, info};
use ndarray::Axis;
use nl_codebase::data::bands::LsBands;
use nl_codebase::integration::deserialization::deserialize_storage;
use nl_codebase::integration::serde_utils::StorageDeserError;
use nl_codebase::integration::serialization::serialize_storage;
use nl_codebase::nn::controller::ITERATIONS_KEY;
use nl_codebase::nn::layers::nn_layers::GenericStorage;
use nl_codebase::utils::ArrayDynF;
use thiserror::Error;
use crate::run_config::HsWeightInit;

pub const LAST_CHECKPOINT: &str = "ckpt_last.bin";
pub const BEST_CHECKPOINT: &str = "ckpt_best.bin";

/// Storage keys of the optimizer state, never taken from pretrained weights
const OPTIMIZER_PREFIX: &str = "adam_";

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode weights in {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: StorageDeserError,
    },

    #[error("no checkpoint found in {0}")]
    NoCheckpoint(PathBuf),

    #[error("pretrained {key} has shape {found:?}, the model expects {expected:?}")]
    ShapeMismatch {
        key: String,
        found: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("pretrained {key} has {found} input bands but the model has {expected}, set hs_weight_init to use 3-band weights")]
    BandMismatch {
        key: String,
        found: usize,
        expected: usize,
    },
}

pub fn save_storage(storage: &GenericStorage, path: &Path) -> Result<(), WeightsError> {
    let io_error = |source| WeightsError::Io { path: path.to_owned(), source };
    let bytes = serialize_storage(storage, true).map_err(io_error)?;
    fs::write(path, bytes).map_err(io_error)
}

pub fn load_storage(path: &Path) -> Result<GenericStorage, WeightsError> {
    let bytes = fs::read(path).map_err(|source| WeightsError::Io { path: path.to_owned(), source })?;
    deserialize_storage(&bytes).map_err(|source| WeightsError::Decode { path: path.to_owned(), source })
}

/// The last checkpoint of **dir**, or the best one when the run never finished an epoch
pub fn find_checkpoint(dir: &Path) -> Result<PathBuf, WeightsError> {
    [LAST_CHECKPOINT, BEST_CHECKPOINT].iter()
        .map(|o| dir.join(o))
        .find(|o| o.is_file())
        .ok_or_else(|| WeightsError::NoCheckpoint(dir.to_owned()))
}

pub struct PretrainedOptions<'a> {
    pub first_conv_key: &'a str,
    pub ls_bands: Option<LsBands>,
    pub hs_weight_init: Option<HsWeightInit>,
    pub exclude_final_layer: bool,
    pub final_layer_prefix: &'a str,
}

/// Model channels filled from the (red, green, blue) channels of 3-band weights
fn rgb_slots(ls_bands: Option<LsBands>) -> Vec<(usize, usize)> {
    match ls_bands {
        Some(LsBands::Rgb) => vec![(0, 0), (1, 1), (2, 2)],
        Some(LsBands::Ms) => vec![(0, 2), (1, 1), (2, 0)],
        None => Vec::new(),
    }
}

/// Builds the stem kernel (Out, Bands, K, K) of the model from a pretrained one. Pretrained
/// 3-band kernels are in (red, green, blue) order.
pub fn expand_first_conv(key: &str, fresh: &ArrayDynF, pretrained: &ArrayDynF, options: &PretrainedOptions) -> Result<ArrayDynF, WeightsError> {
    let (fresh_shape, pretrained_shape) = (fresh.shape(), pretrained.shape());
    let shape_mismatch = || WeightsError::ShapeMismatch {
        key: key.to_owned(),
        found: pretrained_shape.to_vec(),
        expected: fresh_shape.to_vec(),
    };

    if fresh.ndim() != 4 || pretrained.ndim() != 4 {
        return Err(shape_mismatch());
    }
    if fresh_shape[0] != pretrained_shape[0] || fresh_shape[2..] != pretrained_shape[2..] {
        return Err(shape_mismatch());
    }

    let (bands, source_bands) = (fresh_shape[1], pretrained_shape[1]);
    if bands == source_bands {
        return Ok(pretrained.clone());
    }

    let band_mismatch = || WeightsError::BandMismatch { key: key.to_owned(), found: source_bands, expected: bands };
    let init = match options.hs_weight_init {
        Some(v) if source_bands == 3 => v,
        _ => return Err(band_mismatch()),
    };

    let slots: Vec<_> = rgb_slots(options.ls_bands).into_iter().filter(|(slot, _)| *slot < bands).collect();
    let mut result = fresh.clone();
    for (slot, source) in slots.iter() {
        result.index_axis_mut(Axis(1), *slot).assign(&pretrained.index_axis(Axis(1), *source));
    }

    if let HsWeightInit::Same | HsWeightInit::SameScaled = init {
        let mean = pretrained.mean_axis(Axis(1)).ok_or_else(band_mismatch)?;
        for band in (0..bands).filter(|o| slots.iter().all(|(slot, _)| slot != o)) {
            result.index_axis_mut(Axis(1), band).assign(&mean);
        }
    }
    if init == HsWeightInit::SameScaled {
        result *= 3.0 / bands as f32;
    }

    Ok(result)
}

/// Replaces the parameters of **fresh** with the pretrained ones of the same key. Optimizer state,
/// unknown keys, and (optionally) the final layer are ignored.
pub fn merge_pretrained(mut fresh: GenericStorage, pretrained: GenericStorage, options: &PretrainedOptions) -> Result<GenericStorage, WeightsError> {
    let mut loaded = 0;

    for (key, values) in pretrained.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        if key.starts_with(OPTIMIZER_PREFIX) || key == ITERATIONS_KEY {
            continue;
        }
        if options.exclude_final_layer && key.starts_with(options.final_layer_prefix) {
            debug!("Excluding pretrained {}", key);
            continue;
        }
        let target = match fresh.get_mut(&key) {
            Some(v) => v,
            None => {
                debug!("Model has no parameter {}, skipping it", key);
                continue;
            }
        };

        if target.len() != values.len() {
            return Err(WeightsError::ShapeMismatch {
                key,
                found: vec![values.len()],
                expected: vec![target.len()],
            });
        }

        for (current, value) in target.iter_mut().zip(values.into_iter()) {
            *current = if key == options.first_conv_key {
                expand_first_conv(&key, current, &value, options)?
            } else if current.shape() == value.shape() {
                value
            } else {
                return Err(WeightsError::ShapeMismatch {
                    key,
                    found: value.shape().to_vec(),
                    expected: current.shape().to_vec(),
                });
            };
        }
        loaded += 1;
    }

    info!("Loaded {} pretrained parameters", loaded);
    Ok(fresh)
}

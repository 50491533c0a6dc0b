use std::io;
use std::path::PathBuf;
use nl_codebase::data::shard::ShardError;
use thiserror::Error;

/// Pre-flight failures. Any of them stops the run before training starts.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("output directory {0} does not exist")]
    MissingOutDir(PathBuf),

    #[error("unknown model_name {0:?}, only \"resnet\" is currently supported")]
    UnsupportedModel(String),

    #[error("unknown dataset {name:?}, known datasets: {known}")]
    UnknownDataset { name: String, known: String },

    #[error("found {found} shards for dataset {dataset} in {root}, expected {expected}")]
    ShardCountMismatch {
        dataset: String,
        root: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("stopping, found previous run at {0}")]
    ParamsExist(PathBuf),

    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RunError::Io { path: path.into(), source }
    }
}

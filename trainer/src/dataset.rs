use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use itertools::Itertools;
use log::debug;
use nl_codebase::data::dataset_constants::{DatasetInfo, DatasetTable};
use nl_codebase::data::shard::{count_examples, SHARD_EXTENSION};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use crate::errors::RunError;

/// Share of the shards used for training, the rest is validation
pub const TRAIN_FRACTION: f64 = 0.9;

pub fn dataset_info<'a>(table: &'a DatasetTable, name: &str) -> Result<&'a DatasetInfo, RunError> {
    table.get(name).ok_or_else(|| RunError::UnknownDataset {
        name: name.to_owned(),
        known: table.names().join(", "),
    })
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let entries = match fs::read_dir(dir) {
        Ok(v) => v,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RunError::io(dir, e)),
    };

    let mut paths = entries
        .map(|o| o.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RunError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn is_shard(path: &Path) -> bool {
    path.is_file() && path.file_name()
        .and_then(|o| o.to_str())
        .map(|o| o.ends_with(&format!(".{}", SHARD_EXTENSION)))
        .unwrap_or(false)
}

/// Lists `{data_root}/{dir}/*/*.nlrec.gz`, sorted by path
pub fn list_shards(data_root: &Path, info: &DatasetInfo) -> Result<Vec<PathBuf>, RunError> {
    let mut shards = Vec::new();
    for partition in sorted_entries(&data_root.join(&info.dir))? {
        if !partition.is_dir() {
            continue;
        }
        shards.extend(sorted_entries(&partition)?.into_iter().filter(|o| is_shard(o)));
    }
    shards.sort();
    Ok(shards)
}

/// Same as **list_shards**, but the number of shards must match the dataset table
pub fn find_shards(data_root: &Path, name: &str, info: &DatasetInfo) -> Result<Vec<PathBuf>, RunError> {
    let shards = list_shards(data_root, info)?;
    if shards.len() != info.expected_shards {
        return Err(RunError::ShardCountMismatch {
            dataset: name.to_owned(),
            root: data_root.join(&info.dir),
            found: shards.len(),
            expected: info.expected_shards,
        });
    }
    debug!("Found {} shards for {}", shards.len(), name);
    Ok(shards)
}

/// Shards of a dataset split into disjoint train and validation sets
#[derive(Clone, Debug, PartialEq)]
pub struct ShardIndexSet {
    files: Vec<PathBuf>,
    train: Vec<usize>,
    val: Vec<usize>,
}

impl ShardIndexSet {
    /// Random permutation of all indices, the first 90% are used for training.
    /// The same seed and files always give the same split.
    pub fn partition(files: Vec<PathBuf>, seed: u64) -> Self {
        let mut train: Vec<usize> = (0..files.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        train.shuffle(&mut rng);

        let num_train = (files.len() as f64 * TRAIN_FRACTION) as usize;
        let val = train.split_off(num_train);
        Self { files, train, val }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn train_indices(&self) -> &[usize] {
        &self.train
    }

    pub fn val_indices(&self) -> &[usize] {
        &self.val
    }

    pub fn train_files(&self) -> Vec<PathBuf> {
        self.train.iter().map(|o| self.files[*o].clone()).collect()
    }

    pub fn val_files(&self) -> Vec<PathBuf> {
        self.val.iter().map(|o| self.files[*o].clone()).collect()
    }
}

/// Total number of examples in **files**, read from the shard headers
pub fn count_split_examples(files: &[PathBuf]) -> Result<usize, RunError> {
    let counts = files.par_iter()
        .map(|o| count_examples(o))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts.into_iter().sum())
}

/// Number of batches per pass over **num_examples** examples. Not necessarily an integer.
pub fn steps_per_epoch(num_examples: usize, batch_size: usize) -> f64 {
    num_examples as f64 / batch_size as f64
}

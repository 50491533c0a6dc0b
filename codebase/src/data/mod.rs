//! Satellite image shards and the pipeline that turns them into training batches

pub mod bands;
pub mod dataset_constants;
pub mod shard;
pub mod normalization;
pub mod augment;
pub mod batcher;

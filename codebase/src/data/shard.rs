use std::fs;
use std::io;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use flate2::read::GzDecoder;
use thiserror::Error;
use crate::data::bands::STORED_BANDS;
use crate::integration::compression::{gunzip, gzip};
use crate::integration::deserialization::read_array;
use crate::integration::serde_utils::*;
use crate::integration::serialization::write_array;
use crate::utils::Array3F;

pub const SHARD_VERSION: u8 = 1;
pub const SHARD_EXTENSION: &str = "nlrec.gz";

/// One surveyed location: its image with every stored band, and when and where it was taken
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub year: i32,
    pub lat: f32,
    pub lon: f32,
    /// (Bands, Height, Width) in the order of `Band::ALL`
    pub bands: Array3F,
}

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("can't read shard {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("shard is not valid: {0}")]
    Decode(#[from] StorageDeserError),
    #[error("shard is not gzip data: {0}")]
    Gzip(io::Error),
    #[error("unsupported shard version {0}")]
    UnsupportedVersion(u8),
    #[error("record {index} has shape {shape:?}, expected (bands, height, width) with every stored band")]
    BadShape { index: usize, shape: Vec<usize> },
    #[error("shard has {0} trailing bytes")]
    TrailingBytes(usize),
}

pub fn encode_shard(examples: &[Example]) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    body.push(SHARD_VERSION);
    write_u32(&mut body, examples.len() as u32);
    for example in examples {
        write_i32(&mut body, example.year);
        write_f32(&mut body, example.lat);
        write_f32(&mut body, example.lon);
        write_array(&mut body, &example.bands.clone().into_dyn());
    }
    gzip(&body)
}

pub fn decode_shard(bytes: &[u8]) -> Result<Vec<Example>, ShardError> {
    let body = gunzip(bytes).map_err(ShardError::Gzip)?;
    let mut source = body.as_slice();

    let version = read_u8(&mut source).map_err(StorageDeserError::from)?;
    if version != SHARD_VERSION {
        return Err(ShardError::UnsupportedVersion(version));
    }

    let count = read_u32(&mut source).map_err(StorageDeserError::from)? as usize;
    let mut result = Vec::with_capacity(count.min(1024));
    for index in 0..count {
        let year = read_i32(&mut source).map_err(StorageDeserError::from)?;
        let lat = read_f32(&mut source).map_err(StorageDeserError::from)?;
        let lon = read_f32(&mut source).map_err(StorageDeserError::from)?;
        let bands = read_array(&mut source)?;
        if bands.ndim() != 3 || bands.shape()[0] != STORED_BANDS {
            return Err(ShardError::BadShape { index, shape: bands.shape().to_vec() });
        }
        let bands: Array3F = bands.into_dimensionality()
            .map_err(|_| ShardError::BadShape { index, shape: vec![] })?;
        result.push(Example { year, lat, lon, bands });
    }

    if !source.is_empty() {
        return Err(ShardError::TrailingBytes(source.len()));
    }
    Ok(result)
}

pub fn read_shard(path: &Path) -> Result<Vec<Example>, ShardError> {
    let bytes = fs::read(path).map_err(|source| ShardError::Io { path: path.to_owned(), source })?;
    decode_shard(&bytes)
}

/// Number of examples in the shard at **path**. Only the header is decompressed.
pub fn count_examples(path: &Path) -> Result<usize, ShardError> {
    let file = fs::File::open(path).map_err(|source| ShardError::Io { path: path.to_owned(), source })?;
    let mut source = GzDecoder::new(BufReader::new(file));

    let version = read_u8(&mut source).map_err(ShardError::Gzip)?;
    if version != SHARD_VERSION {
        return Err(ShardError::UnsupportedVersion(version));
    }
    Ok(read_u32(&mut source).map_err(ShardError::Gzip)? as usize)
}

pub fn write_shard(path: &Path, examples: &[Example]) -> Result<(), ShardError> {
    let io_err = |source| ShardError::Io { path: path.to_owned(), source };
    let bytes = encode_shard(examples).map_err(io_err)?;
    fs::write(path, bytes).map_err(io_err)
}

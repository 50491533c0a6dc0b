use std::io;
use std::io::{Read, Write};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

pub fn compress_default(bytes: &[u8]) -> Result<Vec<u8>, io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(bytes)?;
    encoder.finish()
}

pub fn decompress_default(bytes: &[u8]) -> Result<Vec<u8>, io::Error> {
    let mut result = Vec::new();
    let mut decoder = ZlibDecoder::new(bytes);
    decoder.read_to_end(&mut result)?;
    Ok(result)
}

/// Shards are gzip files, so they can be inspected with standard tools
pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>, io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, io::Error> {
    let mut result = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let bytes: Vec<u8> = (0..200u32).map(|o| (o % 7) as u8).collect();
        assert_eq!(decompress_default(&compress_default(&bytes).unwrap()).unwrap(), bytes);
        assert_eq!(gunzip(&gzip(&bytes).unwrap()).unwrap(), bytes);
        assert!(gunzip(&bytes).is_err());
    }
}

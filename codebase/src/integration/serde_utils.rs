use std::io::{self, Read};
use std::string::FromUtf8Error;
use thiserror::Error;

pub fn read_u8(source: &mut impl Read) -> io::Result<u8> {
    let mut buffer = [0];
    source.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

pub fn read_u32(source: &mut impl Read) -> io::Result<u32> {
    let mut buffer = [0; 4];
    source.read_exact(&mut buffer)?;
    Ok(u32::from_be_bytes(buffer))
}

pub fn write_u32(result: &mut Vec<u8>, num: u32) {
    result.extend(num.to_be_bytes())
}

pub fn read_i32(source: &mut impl Read) -> io::Result<i32> {
    let mut buffer = [0; 4];
    source.read_exact(&mut buffer)?;
    Ok(i32::from_be_bytes(buffer))
}

pub fn write_i32(result: &mut Vec<u8>, num: i32) {
    result.extend(num.to_be_bytes())
}

pub fn read_f32(source: &mut impl Read) -> io::Result<f32> {
    let mut buffer = [0; 4];
    source.read_exact(&mut buffer)?;
    Ok(f32::from_be_bytes(buffer))
}

pub fn write_f32(result: &mut Vec<u8>, num: f32) {
    result.extend(num.to_be_bytes())
}

#[derive(Debug, Error)]
pub enum StorageDeserError {
    #[error("not enough bytes: {0}")]
    NotEnoughBytes(#[from] io::Error),
    #[error("key is not valid utf-8: {0}")]
    WrongStringEncoding(#[from] FromUtf8Error),
    #[error("array of shape {0:?} is too large")]
    InvalidShape(Vec<usize>),
    #[error("unknown compression flag {0}")]
    UnknownCompression(u8),
}

pub type DeserResult<T> = Result<T, StorageDeserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_big_endian() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 1);
        write_i32(&mut bytes, -2);
        write_f32(&mut bytes, 1.5);
        assert_eq!(&bytes[..4], &[0, 0, 0, 1]);

        let mut source = bytes.as_slice();
        assert_eq!(read_u32(&mut source).unwrap(), 1);
        assert_eq!(read_i32(&mut source).unwrap(), -2);
        assert_eq!(read_f32(&mut source).unwrap(), 1.5);
        assert!(read_u8(&mut source).is_err());
    }
}

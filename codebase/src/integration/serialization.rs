use std::io;
use crate::integration::compression::compress_default;
use crate::integration::serde_utils::*;
use crate::{nn::layers::nn_layers::GenericStorage, utils::ArrayDynF};

pub fn write_num_vec(result: &mut Vec<u8>, array: &ArrayDynF) {
    array
        .iter()
        .flat_map(|o| o.to_be_bytes())
        .for_each(|o| result.push(o))
}

/// Rank, dimensions, then the values in logical order. All numbers are big-endian.
pub fn write_array(result: &mut Vec<u8>, array: &ArrayDynF) {
    write_u32(result, array.shape().len() as u32);
    for shape_item in array.shape().iter() {
        write_u32(result, *shape_item as u32);
    }
    write_num_vec(result, array);
}

fn write_storage(result: &mut Vec<u8>, storage: &GenericStorage) {
    let mut keys: Vec<_> = storage.keys().collect();
    keys.sort();

    for key in keys {
        let value = &storage[key];
        write_u32(result, key.len() as u32);
        result.extend(key.as_bytes());

        write_u32(result, value.len() as u32);
        for item in value.iter() {
            write_array(result, item);
        }
    }
}

/// First byte tells if the rest is compressed with zlib
pub fn serialize_storage(storage: &GenericStorage, compress: bool) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    write_storage(&mut body, storage);

    let mut result = Vec::with_capacity(body.len() + 1);
    if compress {
        result.push(1);
        result.extend(compress_default(&body)?);
    } else {
        result.push(0);
        result.extend(body);
    }
    Ok(result)
}

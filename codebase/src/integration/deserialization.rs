use std::io::Read;
use crate::ArrayDynF;
use crate::integration::compression::decompress_default;
use crate::integration::serde_utils::*;
use crate::nn::layers::nn_layers::GenericStorage;

/// Arrays larger than this are treated as corrupted input
const MAX_ARRAY_LEN: usize = 1 << 30;

fn read_num_vec(source: &mut impl Read, shape: &[usize]) -> DeserResult<ArrayDynF> {
    let length = shape.iter().try_fold(1usize, |a, &b| a.checked_mul(b))
        .filter(|&o| o <= MAX_ARRAY_LEN)
        .ok_or_else(|| StorageDeserError::InvalidShape(shape.to_vec()))?;
    let mut buffer = vec![0; length * 4];
    source.read_exact(&mut buffer)?;

    let nums = buffer
        .chunks_exact(4)
        .map(|arr| f32::from_be_bytes([arr[0], arr[1], arr[2], arr[3]]))
        .collect();
    ArrayDynF::from_shape_vec(shape, nums).map_err(|_| StorageDeserError::InvalidShape(shape.to_vec()))
}

pub fn read_array(source: &mut impl Read) -> DeserResult<ArrayDynF> {
    let shape_len = read_u32(source)? as usize;
    let mut shape = Vec::with_capacity(shape_len.min(16));
    for _ in 0..shape_len {
        shape.push(read_u32(source)? as usize);
    }

    read_num_vec(source, &shape)
}

fn read_storage(source: &mut &[u8]) -> DeserResult<GenericStorage> {
    let mut result = GenericStorage::new();

    while !source.is_empty() {
        let key_len = read_u32(source)?;
        let mut key_bytes = vec![0; key_len as usize];
        source.read_exact(&mut key_bytes)?;
        let key = String::from_utf8(key_bytes)?;

        let vec_len = read_u32(source)? as usize;
        let mut arrays = Vec::with_capacity(vec_len.min(16));
        for _ in 0..vec_len {
            arrays.push(read_array(source)?);
        }

        result.insert(key, arrays);
    }

    Ok(result)
}

pub fn deserialize_storage(mut bytes: &[u8]) -> DeserResult<GenericStorage> {
    match read_u8(&mut bytes)? {
        0 => read_storage(&mut bytes),
        1 => {
            let body = decompress_default(bytes)?;
            read_storage(&mut body.as_slice())
        }
        other => Err(StorageDeserError::UnknownCompression(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_rand::rand;
    use rand::prelude::*;
    use crate::integration::serialization::serialize_storage;

    fn random_storage() -> GenericStorage {
        let mut inputs = GenericStorage::new();
        let mut rng = StdRng::seed_from_u64(7);
        let dist = rand::distributions::Uniform::new(-10.0, 10.0);

        for index in 0..20 {
            let key = format!("layer_{}", index);

            let value_len = rng.gen_range(1..5);
            let mut value = Vec::with_capacity(value_len);
            for _ in 0..value_len {
                let shape: Vec<usize> = (0..rng.gen_range(1..5))
                    .map(|_| rng.gen_range(1..8))
                    .collect();
                let length = shape.iter().product();
                let v = (&mut rng).sample_iter(dist).take(length).collect();

                value.push(ArrayDynF::from_shape_vec(shape, v).unwrap())
            }

            inputs.insert(key, value);
        }
        inputs
    }

    #[test]
    fn test_integrity() {
        let inputs = random_storage();
        for compress in [false, true] {
            let serialized = serialize_storage(&inputs, compress).unwrap();
            assert_eq!(serialized[0], compress as u8);
            let result = deserialize_storage(&serialized).unwrap();
            assert_eq!(inputs, result);
        }
    }

    #[test]
    fn test_truncated_input() {
        let serialized = serialize_storage(&random_storage(), false).unwrap();
        let result = deserialize_storage(&serialized[..serialized.len() - 3]);
        assert!(matches!(result, Err(StorageDeserError::NotEnoughBytes(_))));
    }

    #[test]
    fn test_unknown_flag() {
        assert!(matches!(deserialize_storage(&[9]), Err(StorageDeserError::UnknownCompression(9))));
    }
}

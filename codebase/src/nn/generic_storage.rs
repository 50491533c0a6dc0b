use anyhow::anyhow;
use crate::nn::layers::nn_layers::GenericStorage;
use crate::utils::{ArrayDynF, GenericResult};

fn missing(key: &str) -> anyhow::Error {
    anyhow!("key '{}' not found in storage", key)
}

pub fn clone_from_storage1(storage: &GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 1]> {
    match storage.get(key).map(|o| o.as_slice()) {
        Some([a, ..]) => Ok([a.clone()]),
        _ => Err(missing(key)),
    }
}

pub fn clone_from_storage2(storage: &GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 2]> {
    match storage.get(key).map(|o| o.as_slice()) {
        Some([a, b, ..]) => Ok([a.clone(), b.clone()]),
        _ => Err(missing(key)),
    }
}

pub fn clone_from_storage4(storage: &GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 4]> {
    match storage.get(key).map(|o| o.as_slice()) {
        Some([a, b, c, d, ..]) => Ok([a.clone(), b.clone(), c.clone(), d.clone()]),
        _ => Err(missing(key)),
    }
}

pub fn remove_from_storage1(storage: &mut GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 1]> {
    let mut data = storage.remove(key).ok_or_else(|| missing(key))?;
    if data.is_empty() {
        return Err(missing(key));
    }
    Ok([data.remove(0)])
}

pub fn remove_from_storage2(storage: &mut GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 2]> {
    let data = storage.remove(key).ok_or_else(|| missing(key))?;
    let [a, b]: [ArrayDynF; 2] = data.try_into().map_err(|_| missing(key))?;
    Ok([a, b])
}

pub fn remove_from_storage4(storage: &mut GenericStorage, key: &str) -> GenericResult<[ArrayDynF; 4]> {
    let data = storage.remove(key).ok_or_else(|| missing(key))?;
    let [a, b, c, d]: [ArrayDynF; 4] = data.try_into().map_err(|_| missing(key))?;
    Ok([a, b, c, d])
}

pub fn get_mut_from_storage<'a>(storage: &'a mut GenericStorage, key: &str, index: usize) -> GenericResult<&'a mut ArrayDynF> {
    storage.get_mut(key)
        .and_then(|data| data.get_mut(index))
        .ok_or_else(|| missing(key))
}

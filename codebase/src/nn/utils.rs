use ndarray::s;
use crate::Array4F;

pub fn pad4d(array: Array4F, padding: usize, value: f32) -> Array4F {
    if padding == 0 {
        return array;
    }
    let shape = array.shape();
    let height = shape[2];
    let width = shape[3];
    let mut result = Array4F::from_elem(
        (
            shape[0],
            shape[1],
            height + 2 * padding,
            width + 2 * padding,
        ),
        value,
    );
    let mut slice = result.slice_mut(s![
        ..,
        ..,
        padding..height + padding,
        padding..width + padding
    ]);
    slice.assign(&array);
    result
}

pub fn remove_padding_4d(array: Array4F, padding: usize) -> Array4F {
    if padding == 0 {
        return array;
    }
    let shape = array.shape();
    let height = shape[2] - padding;
    let width = shape[3] - padding;
    array.slice_move(s![.., .., padding..height, padding..width])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_and_remove() {
        let array = Array4F::ones((1, 2, 3, 3));
        let padded = pad4d(array.clone(), 2, 0.0);
        assert_eq!(padded.shape(), &[1, 2, 7, 7]);
        assert_eq!(padded.sum(), array.sum());
        assert_eq!(remove_padding_4d(padded, 2), array);
    }
}

use ndarray::{Array, Array1, Array2, Array3, Array4, azip, Dimension, IxDyn};

pub use ndarray;

type F = f32;
pub type ArrayF<D> = Array<F, D>;
pub type Array1F = Array1<F>;
pub type Array2F = Array2<F>;
pub type Array3F = Array3<F>;
pub type Array4F = Array4<F>;
pub type ArrayDynF = Array<F, IxDyn>;

pub type GenericResult<T> = anyhow::Result<T>;

pub trait GetBatchSize {
    fn batch_size(&self) -> usize;
}

impl<D: Dimension> GetBatchSize for ArrayF<D> {
    fn batch_size(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }
}

pub fn arrays_almost_equal<D: Dimension>(arr1: &ArrayF<D>, arr2: &ArrayF<D>) -> bool {
    arr1.shape() == arr2.shape() && azip!(arr1, arr2).all(|a, b| (a - b).abs() < 0.001)
}

pub fn lerp_arrays<D: Dimension>(a: &ArrayF<D>, b: &ArrayF<D>, t: F) -> ArrayF<D> {
    a + &((b - a) * t)
}

/// Output height and width of a sliding window over the last 2 axes. The window covers
/// `dilation * (size - 1) + 1` input pixels.
pub fn get_dims_after_filter(height: usize, width: usize, size: usize, stride: usize, dilation: usize) -> (usize, usize) {
    let span = dilation * (size - 1) + 1;
    if height < span || width < span {
        return (0, 0);
    }
    ((height - span) / stride + 1, (width - span) / stride + 1)
}

use ndarray::{ArrayView4, ArrayViewMut4, s};
use crate::Array4F;
use crate::utils::Array2F;
use crate::utils::GenericResult;

pub mod convolution;
pub mod max_pool;

/// Geometry of a sliding 2D window
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Window {
    pub size: usize,
    pub stride: usize,
    pub dilation: usize,
}

impl Window {
    /// Input pixels covered by one placement of the window
    pub fn span(&self) -> usize {
        self.dilation * (self.size - 1) + 1
    }

    /// Every input pixel that is multiplied by the kernel element at (kh, kw), for all output
    /// positions at once: (Batch, Channels, OutHeight, OutWidth)
    pub fn tap<'a>(&self, padded: &'a Array4F, kh: usize, kw: usize, out_height: usize, out_width: usize) -> ArrayView4<'a, f32> {
        let h0 = kh * self.dilation;
        let w0 = kw * self.dilation;
        padded.slice(s![
            ..,
            ..,
            h0..h0 + (out_height - 1) * self.stride + 1; self.stride,
            w0..w0 + (out_width - 1) * self.stride + 1; self.stride
        ])
    }

    pub fn tap_mut<'a>(&self, padded: &'a mut Array4F, kh: usize, kw: usize, out_height: usize, out_width: usize) -> ArrayViewMut4<'a, f32> {
        let h0 = kh * self.dilation;
        let w0 = kw * self.dilation;
        padded.slice_mut(s![
            ..,
            ..,
            h0..h0 + (out_height - 1) * self.stride + 1; self.stride,
            w0..w0 + (out_width - 1) * self.stride + 1; self.stride
        ])
    }
}

/// Lays a (Batch, Channels, H, W) view out as (Channels, Batch * H * W)
pub(crate) fn channels_to_rows(view: ArrayView4<f32>) -> GenericResult<Array2F> {
    let shape = view.shape();
    let rows = shape[1];
    let cols = shape[0] * shape[2] * shape[3];
    let data: Vec<f32> = view.permuted_axes([1, 0, 2, 3]).iter().copied().collect();
    Ok(Array2F::from_shape_vec((rows, cols), data)?)
}

#[cfg(test)]
mod tests {
    use ndarray::Array;
    use super::*;

    #[test]
    fn test_tap_dilated() {
        let padded: Array4F = Array::range(0.0, 49.0, 1.0).into_shape((1, 1, 7, 7)).unwrap();
        let window = Window { size: 3, stride: 2, dilation: 2 };
        let (oh, ow) = crate::utils::get_dims_after_filter(7, 7, window.size, window.stride, window.dilation);
        assert_eq!((oh, ow), (2, 2));

        let tap = window.tap(&padded, 1, 2, oh, ow);
        // Row offset 2, column offset 4, stepping by the stride
        assert_eq!(tap[(0, 0, 0, 0)], 18.0);
        assert_eq!(tap[(0, 0, 0, 1)], 20.0);
        assert_eq!(tap[(0, 0, 1, 0)], 32.0);
    }

    #[test]
    fn test_channels_to_rows() {
        let arr: Array4F = Array::range(0.0, 8.0, 1.0).into_shape((2, 2, 1, 2)).unwrap();
        let rows = channels_to_rows(arr.view()).unwrap();
        assert_eq!(rows, ndarray::array![[0.0, 1.0, 4.0, 5.0], [2.0, 3.0, 6.0, 7.0]]);
    }
}

//! Dense N-D arrays with row-major strides.
//!
//! Purpose
//! - Provide the single flat storage layout shared by images, label fields,
//!   masks, and the max-flow residual tables. Axis 0 is the slowest axis and
//!   the last axis is contiguous; the neighbourhood offset encoding relies on
//!   exactly this layout.
//!
//! Why this design
//! - The max-flow engine addresses nodes by linear index and steps between
//!   neighbours by precomputed linear deltas, so storage is a plain `Vec<T>`
//!   plus strides rather than a nested structure.

use crate::error::SegError;
use crate::Real;

/// Dense N-D array (row-major, last axis fastest).
///
/// Invariants:
/// - `data.len() == shape.iter().product()`.
/// - `strides[ndim - 1] == 1`; `strides[a] == strides[a + 1] * shape[a + 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<T>,
}

fn strides_for(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for a in (0..shape.len().saturating_sub(1)).rev() {
        strides[a] = strides[a + 1] * shape[a + 1];
    }
    strides
}

impl<T: Clone> NdArray<T> {
    /// Array of the given shape with every element set to `value`.
    pub fn filled(shape: &[usize], value: T) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            strides: strides_for(shape),
            data: vec![value; len],
        }
    }

    /// Wrap an existing flat buffer; `data.len()` must match the shape.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self, SegError> {
        let len: usize = shape.iter().product();
        if data.len() != len {
            return Err(SegError::arg(format!(
                "data length {} does not match shape {:?} ({} elements)",
                data.len(),
                shape,
                len
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: strides_for(shape),
            data,
        })
    }

    /// Reallocate to a new shape; element values are unspecified afterwards.
    pub fn resize(&mut self, shape: &[usize], fill: T) {
        let len = shape.iter().product();
        self.shape = shape.to_vec();
        self.strides = strides_for(shape);
        self.data.clear();
        self.data.resize(len, fill);
    }
}

impl<T> NdArray<T> {
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Linear index of an N-D coordinate.
    #[inline]
    pub fn linear(&self, idx: &[usize]) -> usize {
        debug_assert_eq!(idx.len(), self.shape.len());
        let mut lin = 0usize;
        for (a, &i) in idx.iter().enumerate() {
            debug_assert!(i < self.shape[a], "index out of bounds on axis {a}");
            lin += i * self.strides[a];
        }
        lin
    }

    /// N-D coordinate of a linear index, written into `out`.
    #[inline]
    pub fn coords(&self, lin: usize, out: &mut [usize]) {
        debug_assert_eq!(out.len(), self.shape.len());
        let mut rem = lin;
        for a in 0..self.shape.len() {
            out[a] = rem / self.strides[a];
            rem %= self.strides[a];
        }
    }

    #[inline]
    pub fn at(&self, idx: &[usize]) -> &T {
        &self.data[self.linear(idx)]
    }
    #[inline]
    pub fn at_mut(&mut self, idx: &[usize]) -> &mut T {
        let lin = self.linear(idx);
        &mut self.data[lin]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

/// Scalar image: intensities plus the per-axis spacing used by the metric.
#[derive(Clone, Debug)]
pub struct Image<T> {
    pub data: NdArray<T>,
    pub spacing: Vec<T>,
}

impl<T: Real> Image<T> {
    /// Image with unit spacing on every axis.
    pub fn new(data: NdArray<T>) -> Self {
        let spacing = vec![T::one(); data.ndim()];
        Self { data, spacing }
    }

    /// Image with explicit per-axis spacing (must match the rank).
    pub fn with_spacing(data: NdArray<T>, spacing: Vec<T>) -> Result<Self, SegError> {
        if spacing.len() != data.ndim() {
            return Err(SegError::arg(format!(
                "spacing has {} entries for a rank-{} image",
                spacing.len(),
                data.ndim()
            )));
        }
        if spacing.iter().any(|s| !(*s > T::zero())) {
            return Err(SegError::arg("spacing entries must be positive"));
        }
        Ok(Self { data, spacing })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
    #[inline]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_row_major() {
        let a: NdArray<f64> = NdArray::filled(&[3, 4, 5], 0.0);
        assert_eq!(a.strides(), &[20, 5, 1]);
        assert_eq!(a.len(), 60);
    }

    #[test]
    fn linear_and_coords_round_trip() {
        let a: NdArray<f64> = NdArray::filled(&[3, 4], 0.0);
        let mut c = [0usize; 2];
        for lin in 0..a.len() {
            a.coords(lin, &mut c);
            assert_eq!(a.linear(&c), lin);
        }
        assert_eq!(a.linear(&[2, 3]), 11);
    }

    #[test]
    fn from_vec_rejects_length_mismatch() {
        let r = NdArray::from_vec(&[2, 2], vec![1.0f64; 3]);
        assert!(r.is_err());
    }

    #[test]
    fn image_spacing_validation() {
        let data: NdArray<f64> = NdArray::filled(&[4, 4], 0.0);
        assert!(Image::with_spacing(data.clone(), vec![1.0]).is_err());
        assert!(Image::with_spacing(data.clone(), vec![1.0, -1.0]).is_err());
        let img = Image::with_spacing(data, vec![2.0, 1.0]).unwrap();
        assert_eq!(img.spacing, vec![2.0, 1.0]);
    }

    #[test]
    fn resize_reallocates() {
        let mut a: NdArray<u8> = NdArray::filled(&[2, 2], 7);
        a.resize(&[3, 3], 0);
        assert_eq!(a.shape(), &[3, 3]);
        assert_eq!(a.len(), 9);
    }
}

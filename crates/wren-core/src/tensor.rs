// Tensor — owned, shaped f32 buffer
//
// The net owns one Tensor per (node, role) pair: weight, gradient, output and,
// for Input-type nodes, an extra input buffer. Operators never own tensors;
// they receive `&Tensor` / `&mut Tensor` views for the duration of a single
// forward or backward call.
//
// Setting data with a different shape reallocates the buffer. Reading data
// out into a caller-owned Vec grows or shrinks that Vec to fit.

use crate::error::{Error, Result};
use crate::shape::Shape4;

/// An owned `f32` buffer with a 4-D shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tensor {
    shape: Shape4,
    data: Vec<f32>,
}

impl Tensor {
    /// A zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Shape4>) -> Self {
        let shape = shape.into();
        Tensor {
            data: vec![0.0; shape.elem_count()],
            shape,
        }
    }

    /// A tensor with every element set to `value`.
    pub fn full(shape: impl Into<Shape4>, value: f32) -> Self {
        let shape = shape.into();
        Tensor {
            data: vec![value; shape.elem_count()],
            shape,
        }
    }

    /// Build a tensor from a flat NCHW vector.
    pub fn from_vec(shape: impl Into<Shape4>, data: Vec<f32>) -> Result<Self> {
        let shape = shape.into();
        check_len(shape, data.len())?;
        Ok(Tensor { shape, data })
    }

    /// Build a tensor by copying a flat NCHW slice.
    pub fn from_slice(shape: impl Into<Shape4>, data: &[f32]) -> Result<Self> {
        let shape = shape.into();
        check_len(shape, data.len())?;
        Ok(Tensor {
            shape,
            data: data[..shape.elem_count()].to_vec(),
        })
    }

    pub fn shape(&self) -> Shape4 {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the tensor, returning its flat buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Overwrite the buffer with `data`, reshaping to `shape`.
    ///
    /// Only the first `shape.elem_count()` values of `data` are used; a shorter
    /// slice is rejected.
    pub fn set_data(&mut self, shape: impl Into<Shape4>, data: &[f32]) -> Result<()> {
        let shape = shape.into();
        let n = shape.elem_count();
        check_len(shape, data.len())?;
        self.data.clear();
        self.data.extend_from_slice(&data[..n]);
        self.shape = shape;
        Ok(())
    }

    /// Reshape in place. Contents are zeroed when the shape actually changes.
    pub fn resize(&mut self, shape: impl Into<Shape4>) {
        let shape = shape.into();
        if shape != self.shape || self.data.len() != shape.elem_count() {
            self.data.clear();
            self.data.resize(shape.elem_count(), 0.0);
            self.shape = shape;
        }
    }

    /// Copy another tensor's shape and contents into this one.
    pub fn copy_from(&mut self, other: &Tensor) {
        self.data.clear();
        self.data.extend_from_slice(&other.data);
        self.shape = other.shape;
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Copy the contents into a caller-owned buffer, resizing it to fit.
    /// Returns the tensor's shape.
    pub fn read_into(&self, out: &mut Vec<f32>) -> Shape4 {
        out.clear();
        out.extend_from_slice(&self.data);
        self.shape
    }

    /// Iterate over batch items as contiguous slices.
    pub fn samples(&self) -> std::slice::Chunks<'_, f32> {
        self.data.chunks(self.shape.sample_size().max(1))
    }
}

fn check_len(shape: Shape4, got: usize) -> Result<()> {
    let expected = shape.elem_count();
    if got < expected {
        return Err(Error::ElementCountMismatch {
            shape,
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros((2, 3, 1, 2));
        assert_eq!(t.elem_count(), 12);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_vec_checks_count() {
        assert!(Tensor::from_vec((2, 2, 1, 1), vec![1.0, 2.0, 3.0]).is_err());
        let t = Tensor::from_vec((2, 2, 1, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.shape(), Shape4::new(2, 2, 1, 1));
    }

    #[test]
    fn test_set_data_reshapes() {
        let mut t = Tensor::zeros((1, 1, 1, 1));
        t.set_data((3, 1, 1, 1), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.shape(), Shape4::new(3, 1, 1, 1));
        assert_eq!(t.data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_data_rejects_short_slice() {
        let mut t = Tensor::default();
        let err = t.set_data((4, 1, 1, 1), &[1.0]).unwrap_err();
        assert!(matches!(err, Error::ElementCountMismatch { expected: 4, got: 1, .. }));
        assert!(t.is_empty());
    }

    #[test]
    fn test_resize_keeps_data_when_unchanged() {
        let mut t = Tensor::from_vec((2, 1, 1, 1), vec![5.0, 6.0]).unwrap();
        t.resize((2, 1, 1, 1));
        assert_eq!(t.data(), &[5.0, 6.0]);
        t.resize((3, 1, 1, 1));
        assert_eq!(t.data(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_read_into_resizes_caller_buffer() {
        let t = Tensor::from_vec((2, 1, 1, 1), vec![0.5, -0.5]).unwrap();
        let mut out = vec![9.0; 10];
        let shape = t.read_into(&mut out);
        assert_eq!(shape, Shape4::new(2, 1, 1, 1));
        assert_eq!(out, vec![0.5, -0.5]);
    }

    #[test]
    fn test_samples() {
        let t = Tensor::from_vec((2, 1, 1, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let rows: Vec<&[f32]> = t.samples().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..]]);
    }
}

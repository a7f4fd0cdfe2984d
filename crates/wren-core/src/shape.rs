use std::fmt;

use serde::{Deserialize, Serialize};

// Shape4 — fixed 4-D shape descriptor
//
// Every buffer in a net is four-dimensional: (width, height, channels, batch).
// Data is laid out NCHW with width as the fastest-moving index, so the flat
// offset of element (x, y, c, n) is:
//
//   ((n * ch + c) * h + y) * w + x
//
// A zeroed shape describes an empty buffer (a weight buffer of an operator
// that has no weights, or a gradient buffer before the first pass).

/// Shape of a tensor buffer: width, height, channels, batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape4 {
    pub w: usize,
    pub h: usize,
    pub ch: usize,
    pub batch: usize,
}

impl Shape4 {
    /// Create a shape from its four dimensions.
    pub const fn new(w: usize, h: usize, ch: usize, batch: usize) -> Self {
        Shape4 { w, h, ch, batch }
    }

    /// Total number of elements (product of all four dimensions).
    pub fn elem_count(&self) -> usize {
        self.w * self.h * self.ch * self.batch
    }

    /// Number of elements in one batch item.
    pub fn sample_size(&self) -> usize {
        self.w * self.h * self.ch
    }

    /// Whether the shape holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elem_count() == 0
    }

    /// The same per-sample shape with a different batch size.
    pub fn with_batch(&self, batch: usize) -> Self {
        Shape4 { batch, ..*self }
    }

    /// Flat NCHW offset of element `(x, y, c, n)`.
    pub fn offset(&self, x: usize, y: usize, c: usize, n: usize) -> usize {
        ((n * self.ch + c) * self.h + y) * self.w + x
    }
}

impl fmt::Display for Shape4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.w, self.h, self.ch, self.batch)
    }
}

impl From<(usize, usize, usize, usize)> for Shape4 {
    fn from((w, h, ch, batch): (usize, usize, usize, usize)) -> Self {
        Shape4 { w, h, ch, batch }
    }
}

impl From<(usize, usize, usize)> for Shape4 {
    /// Single-item batch.
    fn from((w, h, ch): (usize, usize, usize)) -> Self {
        Shape4 { w, h, ch, batch: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elem_count() {
        let s = Shape4::new(3, 4, 2, 5);
        assert_eq!(s.elem_count(), 120);
        assert_eq!(s.sample_size(), 24);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Shape4::default().is_empty());
        assert_eq!(Shape4::default().elem_count(), 0);
    }

    #[test]
    fn test_offset_width_fastest() {
        let s = Shape4::new(3, 2, 2, 2);
        assert_eq!(s.offset(0, 0, 0, 0), 0);
        assert_eq!(s.offset(1, 0, 0, 0), 1);
        assert_eq!(s.offset(0, 1, 0, 0), 3);
        assert_eq!(s.offset(0, 0, 1, 0), 6);
        assert_eq!(s.offset(0, 0, 0, 1), 12);
        assert_eq!(s.offset(2, 1, 1, 1), 23);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape4::new(2, 1, 3, 4).to_string(), "2 1 3 4");
    }

    #[test]
    fn test_from_triple_has_unit_batch() {
        assert_eq!(Shape4::from((2, 3, 4)), Shape4::new(2, 3, 4, 1));
    }
}

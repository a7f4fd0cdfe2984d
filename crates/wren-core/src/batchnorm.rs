// BatchNorm — the four co-indexed normalization buffers of a node
//
// A block is only meaningful as a unit: mean, variance, scale (γ) and
// shift (β) all share one shape, normally (w, h, ch, 1) of the node's
// per-sample output. An empty block (all four buffers empty) is what an
// operator without normalization reports.

use crate::error::{Error, Result};
use crate::shape::Shape4;

/// Batch-normalization statistics and learnt affine parameters of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchNorm {
    pub shape: Shape4,
    pub mean: Vec<f32>,
    pub variance: Vec<f32>,
    pub scale: Vec<f32>,
    pub shift: Vec<f32>,
}

impl BatchNorm {
    /// Identity normalization: mean 0, variance 1, scale 1, shift 0.
    pub fn new(shape: Shape4) -> Self {
        let n = shape.elem_count();
        BatchNorm {
            shape,
            mean: vec![0.0; n],
            variance: vec![1.0; n],
            scale: vec![1.0; n],
            shift: vec![0.0; n],
        }
    }

    /// Whether the block holds no data.
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of elements per buffer.
    pub fn len(&self) -> usize {
        self.shape.elem_count()
    }

    /// Check that all four buffers match the declared shape.
    pub fn validate(&self) -> Result<()> {
        let n = self.shape.elem_count();
        let parts = [
            ("mean", self.mean.len()),
            ("variance", self.variance.len()),
            ("scale", self.scale.len()),
            ("shift", self.shift.len()),
        ];
        for (name, len) in parts {
            if len != n {
                return Err(Error::msg(format!(
                    "batch-norm '{name}' has {len} elements, shape {} requires {n}",
                    self.shape
                )));
            }
        }
        Ok(())
    }
}

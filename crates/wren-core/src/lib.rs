//! # wren-core
//!
//! Core data types shared by every layer of the Wren graph engine.
//!
//! This crate provides:
//! - [`Shape4`] — the fixed 4-D shape `(width, height, channels, batch)`
//! - [`Tensor`] — an owned, shaped `f32` buffer in NCHW order
//! - [`BatchNorm`] — the four co-indexed batch-normalization buffers
//! - [`Node`] — a named graph vertex with operator type, params and adjacency
//! - [`Error`] / [`Result`] — the single error type used across the workspace
// - Shape4: width-fastest NCHW shape descriptor
// - Tensor: buffer owned by the net, lent to operators per traversal
// - BatchNorm: mean/variance/scale/shift block attached to a node
// - Node: declarative vertex consumed by the validator

pub mod batchnorm;
pub mod error;
pub mod node;
pub mod shape;
pub mod tensor;

pub use batchnorm::BatchNorm;
pub use error::{Error, Result};
pub use node::{Node, OperatorParams, BEGIN_NODE, END_NODE, INPUT_OPERATOR, OUTPUT_OPERATOR};
pub use shape::Shape4;
pub use tensor::Tensor;

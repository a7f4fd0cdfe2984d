//! # Wren
//!
//! A graph execution engine for feed-forward / back-propagation networks.
//!
//! A net is described as a collection of named nodes, each bound to an
//! operator type and linked to its neighbours by name. Wren validates the
//! topology, owns every tensor buffer, drives the forward and backward
//! passes in dependency order and keeps each node's weights, gradients and
//! batch-norm statistics addressable by name.
//!
//! ## Usage
//!
//! ```rust
//! use wren::prelude::*;
//!
//! let net = Net::new(
//!     vec![
//!         Node::new("BeginNet", "Input").with_next("fc1"),
//!         Node::new("fc1", "FullyConnected")
//!             .with_param("units", "1")
//!             .with_param("bias", "false")
//!             .with_prev("BeginNet")
//!             .with_next("EndNet"),
//!         Node::new("EndNet", "Output").with_prev("fc1"),
//!     ],
//!     NetConfig::default(),
//! )
//! .unwrap();
//!
//! net.set_weight_node("fc1", Shape4::new(2, 1, 1, 1), &[0.5, -0.5]).unwrap();
//! let mut out = [0.0f32; 1];
//! net.forward(false, Shape4::new(2, 1, 1, 1), &[1.0, 1.0], Shape4::new(1, 1, 1, 1), &mut out)
//!     .unwrap();
//! assert_eq!(out, [0.0]);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `wren-core` | Shape4, Tensor, BatchNorm, Node, Error |
//! | `wren-ops` | Operator contract, user callbacks, operator registry, reference operators |
//! | `wren` | Validator, engine, Net, JSON description, weight files |
//!
//! ## Modules
//!
//! - [`validate`] — topology checks run before any operator is built
//! - [`net`] — the `Net` orchestrator and its public operations
//! - [`config`] — `NetConfig` and weight-file `LoadMode`
//! - [`description`] — JSON form of a node collection
//! - [`persist`] — weight and batch-norm file format

mod arena;
mod engine;

pub mod config;
pub mod description;
pub mod net;
pub mod persist;
pub mod validate;

/// Re-export core types.
pub use wren_core::{
    bail, BatchNorm, Error, Node, OperatorParams, Result, Shape4, Tensor, BEGIN_NODE, END_NODE,
    INPUT_OPERATOR, OUTPUT_OPERATOR,
};

/// Re-export the operator layer.
pub mod ops {
    pub use wren_ops::*;
}

pub use config::{LoadMode, NetConfig, StatusCallback};
pub use description::NetDescription;
pub use net::Net;

/// Library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Convenience prelude.
pub mod prelude {
    pub use crate::config::{LoadMode, NetConfig};
    pub use crate::description::NetDescription;
    pub use crate::net::Net;
    pub use wren_core::{BatchNorm, Error, Node, OperatorParams, Result, Shape4, Tensor};
    pub use wren_ops::{Operator, OperatorRegistry, UserCall};
}

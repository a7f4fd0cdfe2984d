//! # wren-ops
//!
//! The operator layer of Wren.
//!
//! Provides the pieces every node of a net is executed through:
//!
//! 1. **Operator trait** — forward/backward plus batch-norm and parameter hooks
//! 2. **Contexts** — short-lived borrowed views of the net-owned buffers
//! 3. **Callbacks** — named user callbacks dispatched from `UserLayer` nodes
//! 4. **Registry** — operator type name → constructor
//! 5. **Reference operators** — Input, Output, FullyConnected, Activation,
//!    Summator, LossFunction, BatchNorm, UserLayer
//!
//! Kernels here are plain CPU loops. The engine only depends on
//! the [`Operator`] contract, so any other implementation can be registered
//! under the same type names.

pub mod callback;
pub mod init;
pub mod operator;
pub mod ops;
pub mod registry;

pub use callback::{CallbackRegistry, UserCall, UserCallback};
pub use operator::{Action, BackwardCtx, ExecParams, ForwardCtx, Operator};
pub use ops::{
    Activation, ActivationKind, BatchNormOp, FullyConnected, Input, LossFunction, Output,
    Summator, UserLayer,
};
pub use registry::{OperatorCtor, OperatorRegistry};

// Reference operators
//
// Minimal CPU kernels for the operator types a net description can name out
// of the box. Each one is built from its `Node` (reading `params`) and
// registered under its type name in `OperatorRegistry::default()`.
//
//   Input           copies the node's input buffer to its output
//   Output          passes its single input through, sizes its gradient buffer
//   FullyConnected  dense layer, weight (inputs [+1 bias], units, 1, 1)
//   Activation      relu / sigmoid / none, element-wise
//   Summator        element-wise sum of all inputs
//   LossFunction    identity forward, (output - target) backward
//   BatchNorm       per-feature normalization with running statistics
//   UserLayer       delegates to a registered user callback

mod activation;
mod batchnorm;
mod dense;
mod io;
mod loss;
mod summator;
mod user;

pub use activation::{Activation, ActivationKind};
pub use batchnorm::BatchNormOp;
pub use dense::FullyConnected;
pub use io::{Input, Output};
pub use loss::LossFunction;
pub use summator::Summator;
pub use user::UserLayer;

use std::str::FromStr;

use wren_core::error::{Error, Result};
use wren_core::OperatorParams;

/// Read an optional parameter, falling back to `default`.
pub(crate) fn param_or<T: FromStr>(
    params: &OperatorParams,
    kind: &str,
    key: &str,
    default: T,
) -> Result<T> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            Error::msg(format!("{kind}: invalid value '{raw}' for parameter '{key}'"))
        }),
    }
}

/// Read a parameter that must be present.
pub(crate) fn param_required<T: FromStr>(
    params: &OperatorParams,
    kind: &str,
    key: &str,
) -> Result<T> {
    let raw = params
        .get(key)
        .ok_or_else(|| Error::msg(format!("{kind}: missing parameter '{key}'")))?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::msg(format!("{kind}: invalid value '{raw}' for parameter '{key}'")))
}

// Activation — element-wise nonlinearity
//
// PARAMETERS:
//   active  relu | sigmoid | none (default: relu)
//
// The backward pass derives the local gradient from the forward output, so no
// extra state is cached between the two passes.

use std::fmt;
use std::str::FromStr;

use wren_core::error::{Error, Result};
use wren_core::{Node, OperatorParams, Tensor};

use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "Activation";

/// Supported activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationKind {
    #[default]
    Relu,
    Sigmoid,
    None,
}

impl ActivationKind {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationKind::None => x,
        }
    }

    /// Derivative expressed through the activation output `y`.
    #[inline]
    fn derivative(self, y: f32) -> f32 {
        match self {
            ActivationKind::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationKind::Sigmoid => y * (1.0 - y),
            ActivationKind::None => 1.0,
        }
    }
}

impl FromStr for ActivationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(ActivationKind::Relu),
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "none" => Ok(ActivationKind::None),
            other => Err(Error::msg(format!("{KIND}: unknown function '{other}'"))),
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivationKind::Relu => "relu",
            ActivationKind::Sigmoid => "sigmoid",
            ActivationKind::None => "none",
        };
        f.write_str(s)
    }
}

/// Element-wise activation operator.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    kind: ActivationKind,
}

impl Activation {
    pub fn new(kind: ActivationKind) -> Self {
        Activation { kind }
    }

    pub fn from_node(node: &Node) -> Result<Self> {
        let mut op = Activation::default();
        op.set_params(&node.params)?;
        Ok(op)
    }

    pub fn function(&self) -> ActivationKind {
        self.kind
    }
}

impl Operator for Activation {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        let f = self.kind;
        ctx.output.resize(x.shape());
        for (o, v) in ctx.output.data_mut().iter_mut().zip(x.data()) {
            *o = f.apply(*v);
        }
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        let g = ctx.incoming_grad()?;
        let f = self.kind;
        let mut dx = Tensor::zeros(ctx.output.shape());
        for ((d, y), gv) in dx.data_mut().iter_mut().zip(ctx.output.data()).zip(g.data()) {
            *d = gv * f.derivative(*y);
        }
        *ctx.gradient = dx;
        Ok(())
    }

    fn set_params(&mut self, params: &OperatorParams) -> Result<()> {
        self.kind = match params.get("active") {
            Some(s) => s.parse()?,
            None => ActivationKind::default(),
        };
        Ok(())
    }
}

// LossFunction — turns a target into an error gradient
//
// PARAMETERS:
//   loss  mse (default; the only supported loss)
//
// Placed just before the Output node. Forward is the identity. During
// training the net seeds the Output gradient with the target values; this
// node receives them as its incoming "gradient" and hands back
//
//   d(0.5 * Σ (y - t)²) / dy = y - t
//
// to its predecessors.

use wren_core::error::{Error, Result};
use wren_core::{Node, OperatorParams, Tensor};

use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "LossFunction";

#[derive(Debug, Clone, Default)]
pub struct LossFunction;

impl LossFunction {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut op = LossFunction;
        op.set_params(&node.params)?;
        Ok(op)
    }
}

impl Operator for LossFunction {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        ctx.output.copy_from(x);
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        let target = ctx.incoming_grad()?;
        let mut dy = Tensor::zeros(ctx.output.shape());
        for ((d, y), t) in dy.data_mut().iter_mut().zip(ctx.output.data()).zip(target.data()) {
            *d = y - t;
        }
        *ctx.gradient = dy;
        Ok(())
    }

    fn set_params(&mut self, params: &OperatorParams) -> Result<()> {
        match params.get("loss").map(|s| s.trim()) {
            None | Some("mse") => Ok(()),
            Some(other) => Err(Error::msg(format!("{KIND}: unsupported loss '{other}'"))),
        }
    }
}

// Summator — element-wise sum of every predecessor output
//
// All inputs must share one shape. The gradient of a sum is the incoming
// gradient itself, handed unchanged to each predecessor.

use wren_core::error::{Error, Result};

use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "Summator";

#[derive(Debug, Clone, Default)]
pub struct Summator;

impl Operator for Summator {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let (first, rest) = ctx
            .inputs
            .split_first()
            .ok_or_else(|| Error::msg(format!("node '{}': {KIND} has no inputs", ctx.node)))?;
        let shape = first.shape();
        if let Some(bad) = rest.iter().find(|t| t.shape() != shape) {
            return Err(Error::ShapeMismatch {
                context: "forward",
                node: ctx.node.to_string(),
                expected: shape,
                got: bad.shape(),
            });
        }
        ctx.output.copy_from(first);
        for t in rest {
            for (o, v) in ctx.output.data_mut().iter_mut().zip(t.data()) {
                *o += v;
            }
        }
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        *ctx.gradient = ctx.incoming_grad()?;
        Ok(())
    }
}

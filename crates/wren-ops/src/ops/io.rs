// Input / Output — the boundary operators
//
// An Input node reads the extra input buffer the net allocates for it; the
// net fills that buffer from `forward` (for BeginNet) or `set_input_node`.
// An Output node mirrors its predecessor and keeps its gradient buffer sized
// like its output, so a caller can seed it before the backward pass.

use wren_core::error::Result;
use wren_core::{INPUT_OPERATOR, OUTPUT_OPERATOR};

use crate::operator::{BackwardCtx, ForwardCtx, Operator};

/// Entry operator: output = input buffer.
#[derive(Debug, Default)]
pub struct Input;

impl Operator for Input {
    fn kind(&self) -> &str {
        INPUT_OPERATOR
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        ctx.output.copy_from(x);
        Ok(())
    }

    /// Keeps the gradient w.r.t. the net input inspectable.
    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        if !ctx.grads.is_empty() {
            *ctx.gradient = ctx.incoming_grad()?;
        }
        Ok(())
    }
}

/// Exit operator: output = single predecessor output.
#[derive(Debug, Default)]
pub struct Output;

impl Operator for Output {
    fn kind(&self) -> &str {
        OUTPUT_OPERATOR
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        ctx.output.copy_from(x);
        ctx.gradient.resize(x.shape());
        Ok(())
    }

    /// The gradient buffer was seeded from outside; nothing to compute.
    fn backward(&mut self, _ctx: BackwardCtx<'_>) -> Result<()> {
        Ok(())
    }
}

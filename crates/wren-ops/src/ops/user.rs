// UserLayer — hands the node's data to a host callback
//
// PARAMETERS:
//   cbackName  name of the callback registered on the net (required)
//
// forward:  callback(input)            → node output
// backward: callback(incoming gradient) → node gradient
//
// The callback is looked up at call time, so it may be registered after the
// net is built. A missing name fails the traversal.

use wren_core::error::{Error, Result};
use wren_core::{Node, OperatorParams};

use crate::callback::UserCall;
use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "UserLayer";

#[derive(Debug, Clone)]
pub struct UserLayer {
    callback: String,
}

impl UserLayer {
    pub fn new(callback: impl Into<String>) -> Self {
        UserLayer {
            callback: callback.into(),
        }
    }

    pub fn from_node(node: &Node) -> Result<Self> {
        let mut op = UserLayer::new("");
        op.set_params(&node.params)?;
        Ok(op)
    }

    pub fn callback_name(&self) -> &str {
        &self.callback
    }
}

impl Operator for UserLayer {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        let out = ctx.callbacks.dispatch(&UserCall {
            name: &self.callback,
            node: ctx.node,
            forward: true,
            shape: x.shape(),
            data: x.data(),
        })?;
        *ctx.output = out;
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        let g = ctx.incoming_grad()?;
        let dx = ctx.callbacks.dispatch(&UserCall {
            name: &self.callback,
            node: ctx.node,
            forward: false,
            shape: g.shape(),
            data: g.data(),
        })?;
        *ctx.gradient = dx;
        Ok(())
    }

    fn set_params(&mut self, params: &OperatorParams) -> Result<()> {
        match params.get("cbackName").map(|s| s.trim()) {
            Some(name) if !name.is_empty() => {
                self.callback = name.to_string();
                Ok(())
            }
            _ => Err(Error::msg(format!("{KIND}: missing parameter 'cbackName'"))),
        }
    }
}

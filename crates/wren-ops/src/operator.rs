// Operator — the capability contract executed at every node
//
// The engine knows nothing about convolution, activations or losses. It only
// calls `forward` and `backward` on a boxed `Operator`, in dependency order,
// handing it borrowed views of the buffers the net owns:
//
//   forward:  inputs (predecessor outputs, or the node's own input buffer)
//             → output, possibly touching weight / gradient
//   backward: incoming gradients (the successors' gradient buffers)
//             → own gradient buffer, weight updated in place when learning
//
// Views live exactly as long as the call. An operator may keep private scratch
// state (cached activations, running statistics) but never a buffer reference.

use wren_core::error::{Error, Result};
use wren_core::{BatchNorm, OperatorParams, Tensor};

use crate::callback::CallbackRegistry;

/// Which pass a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Backward,
}

/// Per-call execution parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecParams {
    pub learning_rate: f32,
    /// Training mode: batch statistics are used and weights may be updated.
    pub is_learning: bool,
    pub action: Action,
}

impl ExecParams {
    pub fn forward(is_learning: bool) -> Self {
        ExecParams {
            learning_rate: 0.0,
            is_learning,
            action: Action::Forward,
        }
    }

    pub fn backward(learning_rate: f32) -> Self {
        ExecParams {
            learning_rate,
            is_learning: true,
            action: Action::Backward,
        }
    }
}

/// Buffers lent to an operator for one forward call.
pub struct ForwardCtx<'a> {
    /// Name of the node being executed.
    pub node: &'a str,
    /// Predecessor outputs in `prev` order; for Input nodes, the input buffer.
    pub inputs: &'a [&'a Tensor],
    pub weight: &'a mut Tensor,
    pub output: &'a mut Tensor,
    pub gradient: &'a mut Tensor,
    pub params: &'a ExecParams,
    pub callbacks: &'a CallbackRegistry,
}

/// Buffers lent to an operator for one backward call.
pub struct BackwardCtx<'a> {
    pub node: &'a str,
    /// The same inputs the forward pass consumed.
    pub inputs: &'a [&'a Tensor],
    /// The node's own forward output.
    pub output: &'a Tensor,
    /// Gradient buffers of the successors, in `next` order.
    pub grads: &'a [&'a Tensor],
    pub weight: &'a mut Tensor,
    /// The gradient this node hands back to its predecessors.
    pub gradient: &'a mut Tensor,
    pub params: &'a ExecParams,
    pub callbacks: &'a CallbackRegistry,
}

impl<'a> ForwardCtx<'a> {
    /// The single input of a one-input operator.
    pub fn single_input(&self) -> Result<&'a Tensor> {
        single(self.inputs, self.node)
    }
}

impl<'a> BackwardCtx<'a> {
    pub fn single_input(&self) -> Result<&'a Tensor> {
        single(self.inputs, self.node)
    }

    /// Sum of the incoming gradients.
    ///
    /// A node feeding several successors receives one gradient from each;
    /// they must all have the node's output shape.
    pub fn incoming_grad(&self) -> Result<Tensor> {
        let expected = self.output.shape();
        let mut sum = Tensor::zeros(expected);
        for g in self.grads {
            if g.shape() != expected {
                return Err(Error::ShapeMismatch {
                    context: "backward",
                    node: self.node.to_string(),
                    expected,
                    got: g.shape(),
                });
            }
            for (s, v) in sum.data_mut().iter_mut().zip(g.data()) {
                *s += v;
            }
        }
        Ok(sum)
    }
}

fn single<'a>(inputs: &[&'a Tensor], node: &str) -> Result<&'a Tensor> {
    match inputs {
        [one] => Ok(*one),
        _ => Err(Error::msg(format!(
            "node '{}' expects exactly one input, got {}",
            node,
            inputs.len()
        ))),
    }
}

/// The polymorphic execution unit bound to one node.
///
/// `Send` so a net can be shared across threads behind its lock.
pub trait Operator: Send {
    /// Operator type name, as used in net descriptions.
    fn kind(&self) -> &str;

    /// Compute the output from the inputs and weights.
    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()>;

    /// Propagate incoming gradients to the node's gradient buffer and,
    /// when learning, update the weights in place.
    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()>;

    /// The operator's batch-norm block. Empty for operators without one.
    fn batch_norm(&self) -> BatchNorm {
        BatchNorm::default()
    }

    /// Install a batch-norm block.
    fn set_batch_norm(&mut self, _bn: BatchNorm) -> Result<()> {
        Err(Error::msg(format!(
            "operator '{}' has no batch-norm parameters",
            self.kind()
        )))
    }

    /// Replace the operator parameters. Operators re-read what they use and
    /// reject values they cannot honour. Default: accept and ignore.
    fn set_params(&mut self, _params: &OperatorParams) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_grad_sums_successors() {
        let out = Tensor::zeros((2, 1, 1, 1));
        let g1 = Tensor::from_vec((2, 1, 1, 1), vec![1.0, 2.0]).unwrap();
        let g2 = Tensor::from_vec((2, 1, 1, 1), vec![0.5, 0.5]).unwrap();
        let grads = [&g1, &g2];
        let mut weight = Tensor::default();
        let mut gradient = Tensor::default();
        let params = ExecParams::backward(0.1);
        let callbacks = CallbackRegistry::default();
        let ctx = BackwardCtx {
            node: "n",
            inputs: &[],
            output: &out,
            grads: &grads,
            weight: &mut weight,
            gradient: &mut gradient,
            params: &params,
            callbacks: &callbacks,
        };
        assert_eq!(ctx.incoming_grad().unwrap().data(), &[1.5, 2.5]);
    }

    #[test]
    fn test_incoming_grad_rejects_wrong_shape() {
        let out = Tensor::zeros((2, 1, 1, 1));
        let g = Tensor::zeros((3, 1, 1, 1));
        let grads = [&g];
        let mut weight = Tensor::default();
        let mut gradient = Tensor::default();
        let params = ExecParams::backward(0.1);
        let callbacks = CallbackRegistry::default();
        let ctx = BackwardCtx {
            node: "n",
            inputs: &[],
            output: &out,
            grads: &grads,
            weight: &mut weight,
            gradient: &mut gradient,
            params: &params,
            callbacks: &callbacks,
        };
        assert!(matches!(
            ctx.incoming_grad(),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

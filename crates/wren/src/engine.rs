// Engine — ordered forward/backward traversal over the arena
//
// The execution order is computed once with Kahn's algorithm: a node becomes
// ready when all of its predecessors have run, and among ready nodes the one
// declared first goes first. Backward walks the same order in reverse.
//
// For each node the engine lends the operator:
//
//   forward:  inputs   = own input buffer (Input nodes) or predecessor outputs
//             mutable  = own weight, output, gradient
//   backward: inputs   = as in forward
//             grads    = successor gradient buffers
//             mutable  = own weight, gradient
//
// The node's own buffers are moved out of the arena for the duration of the
// call and moved back afterwards, so the operator can hold `&mut` views of
// them next to `&` views of its neighbours' buffers.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use wren_core::error::{Error, Result};
use wren_core::Tensor;
use wren_ops::{BackwardCtx, CallbackRegistry, ExecParams, ForwardCtx};

use crate::arena::NodeArena;

#[derive(Debug, Clone)]
pub(crate) struct Engine {
    order: Vec<usize>,
}

impl Engine {
    /// Compute the execution order of an arena.
    pub fn new(arena: &NodeArena) -> Result<Self> {
        let n = arena.len();
        let mut pending: Vec<usize> = arena.prev.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &s in &arena.next[i] {
                pending[s] -= 1;
                if pending[s] == 0 {
                    ready.push(Reverse(s));
                }
            }
        }

        if order.len() != n {
            return Err(Error::graph("cycle detected, no execution order exists"));
        }
        Ok(Engine { order })
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn forward(
        &self,
        arena: &mut NodeArena,
        params: &ExecParams,
        callbacks: &CallbackRegistry,
    ) -> Result<()> {
        tracing::debug!(nodes = self.order.len(), is_learning = params.is_learning, "forward pass");
        for &i in &self.order {
            let mut weight = std::mem::take(&mut arena.buffers[i].weight);
            let mut output = std::mem::take(&mut arena.buffers[i].output);
            let mut gradient = std::mem::take(&mut arena.buffers[i].gradient);

            let res = {
                let inputs: Vec<&Tensor> = match &arena.buffers[i].input {
                    Some(input) => vec![input],
                    None => arena.prev[i].iter().map(|&p| &arena.buffers[p].output).collect(),
                };
                let node = arena.nodes[i].name.as_str();
                tracing::trace!(node, op = arena.ops[i].kind(), "forward");
                arena.ops[i].forward(ForwardCtx {
                    node,
                    inputs: &inputs,
                    weight: &mut weight,
                    output: &mut output,
                    gradient: &mut gradient,
                    params,
                    callbacks,
                })
            };

            let slot = &mut arena.buffers[i];
            slot.weight = weight;
            slot.output = output;
            slot.gradient = gradient;
            res?;
        }
        Ok(())
    }

    pub fn backward(
        &self,
        arena: &mut NodeArena,
        params: &ExecParams,
        callbacks: &CallbackRegistry,
    ) -> Result<()> {
        tracing::debug!(nodes = self.order.len(), lr = params.learning_rate, "backward pass");
        for &i in self.order.iter().rev() {
            let mut weight = std::mem::take(&mut arena.buffers[i].weight);
            let mut gradient = std::mem::take(&mut arena.buffers[i].gradient);

            let res = {
                let inputs: Vec<&Tensor> = match &arena.buffers[i].input {
                    Some(input) => vec![input],
                    None => arena.prev[i].iter().map(|&p| &arena.buffers[p].output).collect(),
                };
                let grads: Vec<&Tensor> = arena.next[i]
                    .iter()
                    .map(|&s| &arena.buffers[s].gradient)
                    .collect();
                let node = arena.nodes[i].name.as_str();
                tracing::trace!(node, op = arena.ops[i].kind(), "backward");
                arena.ops[i].backward(BackwardCtx {
                    node,
                    inputs: &inputs,
                    output: &arena.buffers[i].output,
                    grads: &grads,
                    weight: &mut weight,
                    gradient: &mut gradient,
                    params,
                    callbacks,
                })
            };

            let slot = &mut arena.buffers[i];
            slot.weight = weight;
            slot.gradient = gradient;
            res?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wren_core::Node;
    use wren_ops::OperatorRegistry;

    fn arena(nodes: Vec<Node>) -> NodeArena {
        NodeArena::build(nodes, &OperatorRegistry::default()).unwrap()
    }

    #[test]
    fn test_order_respects_dependencies() {
        // Declared out of order on purpose.
        let a = arena(vec![
            Node::new("out", "Output").with_prev("sum"),
            Node::new("sum", "Summator")
                .with_prev("b")
                .with_prev("a")
                .with_next("out"),
            Node::new("a", "Activation").with_prev("in").with_next("sum"),
            Node::new("b", "Activation").with_prev("in").with_next("sum"),
            Node::new("in", "Input").with_next("a").with_next("b"),
        ]);
        let engine = Engine::new(&a).unwrap();
        let names: Vec<&str> = engine
            .order()
            .iter()
            .map(|&i| a.nodes[i].name.as_str())
            .collect();
        assert_eq!(names, vec!["in", "a", "b", "sum", "out"]);
    }

    #[test]
    fn test_forward_backward_through_diamond() {
        let mut a = arena(vec![
            Node::new("in", "Input").with_next("a").with_next("b"),
            Node::new("a", "Activation")
                .with_param("active", "none")
                .with_prev("in")
                .with_next("sum"),
            Node::new("b", "Activation")
                .with_param("active", "none")
                .with_prev("in")
                .with_next("sum"),
            Node::new("sum", "Summator")
                .with_prev("a")
                .with_prev("b")
                .with_next("out"),
            Node::new("out", "Output").with_prev("sum"),
        ]);
        let engine = Engine::new(&a).unwrap();
        let callbacks = CallbackRegistry::default();
        a.buffers[0].input = Some(Tensor::from_vec((2, 1, 1, 1), vec![1.0, 2.0]).unwrap());

        engine
            .forward(&mut a, &ExecParams::forward(false), &callbacks)
            .unwrap();
        assert_eq!(a.buffers[4].output.data(), &[2.0, 4.0]);

        a.buffers[4].gradient = Tensor::from_vec((2, 1, 1, 1), vec![1.0, 1.0]).unwrap();
        engine
            .backward(&mut a, &ExecParams::backward(0.0), &callbacks)
            .unwrap();
        // Input receives the gradient of both branches.
        assert_eq!(a.buffers[0].gradient.data(), &[2.0, 2.0]);
    }

    #[test]
    fn test_operator_error_restores_buffers() {
        let mut a = arena(vec![
            Node::new("in", "Input").with_next("fc"),
            Node::new("fc", "FullyConnected")
                .with_param("units", "1")
                .with_prev("in")
                .with_next("out"),
            Node::new("out", "Output").with_prev("fc"),
        ]);
        let engine = Engine::new(&a).unwrap();
        a.buffers[1].weight = Tensor::zeros((7, 1, 1, 1));
        a.buffers[0].input = Some(Tensor::zeros((2, 1, 1, 1)));
        let res = engine.forward(&mut a, &ExecParams::forward(false), &CallbackRegistry::default());
        assert!(res.is_err());
        assert_eq!(a.buffers[1].weight.elem_count(), 7);
    }
}

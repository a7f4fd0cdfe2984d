// NodeArena — one slot per node, addressed by index
//
// Built once from a validated node collection. Slot i holds node i's
// description, its operator and its buffer set; the name → slot index and
// the adjacency as slot indices are resolved here so the engine and the
// accessors never look names up twice.
//
// BUFFER SET PER NODE:
//
//   weight    operator weights (may stay empty)
//   gradient  gradient handed to the predecessors on backward
//   output    forward result, read by the successors
//   input     only for Input nodes: data fed from outside

use std::collections::HashMap;

use wren_core::error::{Error, Result};
use wren_core::{Node, Tensor};
use wren_ops::{Operator, OperatorRegistry};

#[derive(Debug, Default)]
pub(crate) struct NodeBuffers {
    pub weight: Tensor,
    pub gradient: Tensor,
    pub output: Tensor,
    pub input: Option<Tensor>,
}

pub(crate) struct NodeArena {
    pub nodes: Vec<Node>,
    pub ops: Vec<Box<dyn Operator>>,
    pub buffers: Vec<NodeBuffers>,
    pub prev: Vec<Vec<usize>>,
    pub next: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
}

impl NodeArena {
    /// Instantiate one operator and one buffer set per node.
    ///
    /// The node collection must already be validated.
    pub fn build(nodes: Vec<Node>, registry: &OperatorRegistry) -> Result<Self> {
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();

        let resolve = |names: &[String]| -> Result<Vec<usize>> {
            names
                .iter()
                .map(|n| {
                    index
                        .get(n)
                        .copied()
                        .ok_or_else(|| Error::NodeNotFound(n.clone()))
                })
                .collect()
        };
        let prev = nodes
            .iter()
            .map(|n| resolve(&n.prev))
            .collect::<Result<Vec<_>>>()?;
        let next = nodes
            .iter()
            .map(|n| resolve(&n.next))
            .collect::<Result<Vec<_>>>()?;

        let ops = nodes
            .iter()
            .map(|n| registry.create(n))
            .collect::<Result<Vec<_>>>()?;

        let buffers = nodes
            .iter()
            .map(|n| NodeBuffers {
                input: n.is_input().then(Tensor::default),
                ..Default::default()
            })
            .collect();

        Ok(NodeArena {
            nodes,
            ops,
            buffers,
            prev,
            next,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Slot of a node by name.
    pub fn slot(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    /// Slot of a node by name, if present.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("in", "Input").with_next("act"),
            Node::new("act", "Activation").with_prev("in").with_next("out"),
            Node::new("out", "Output").with_prev("act"),
        ]
    }

    #[test]
    fn test_build_resolves_adjacency() {
        let arena = NodeArena::build(nodes(), &OperatorRegistry::default()).unwrap();
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.prev[1], vec![0]);
        assert_eq!(arena.next[1], vec![2]);
        assert_eq!(arena.slot("out").unwrap(), 2);
        assert!(matches!(arena.slot("x"), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_only_input_nodes_get_input_buffer() {
        let arena = NodeArena::build(nodes(), &OperatorRegistry::default()).unwrap();
        assert!(arena.buffers[0].input.is_some());
        assert!(arena.buffers[1].input.is_none());
        assert!(arena.buffers[2].input.is_none());
    }

    #[test]
    fn test_unknown_operator() {
        let mut n = nodes();
        n[1].operator = "Pooling".into();
        let err = NodeArena::build(n, &OperatorRegistry::default()).err().unwrap();
        assert!(matches!(err, Error::UnknownOperator { .. }));
    }
}

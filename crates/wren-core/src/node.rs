// Node — declarative graph vertex
//
// A node is created once from the net description and never mutated after
// validation (except for its operator parameters, which can be replaced
// through the net). Adjacency is stored by name in both directions; the
// validator enforces that the two directions agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Operator type of the nodes that receive external data.
pub const INPUT_OPERATOR: &str = "Input";
/// Operator type of the nodes that terminate every descendant chain.
pub const OUTPUT_OPERATOR: &str = "Output";
/// Name of the designated entry node bound to the net's external input.
pub const BEGIN_NODE: &str = "BeginNet";
/// Name of the designated exit node bound to the net's external output.
pub const END_NODE: &str = "EndNet";

/// Operator parameters, opaque to the engine: key → textual value.
pub type OperatorParams = BTreeMap<String, String>;

/// A named vertex of the network graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: OperatorParams,
    #[serde(default)]
    pub prev: Vec<String>,
    #[serde(default)]
    pub next: Vec<String>,
}

impl Node {
    /// A node with no parameters and no neighbours.
    pub fn new(name: impl Into<String>, operator: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            operator: operator.into(),
            ..Default::default()
        }
    }

    /// Add a predecessor.
    pub fn with_prev(mut self, name: impl Into<String>) -> Self {
        self.prev.push(name.into());
        self
    }

    /// Add a successor.
    pub fn with_next(mut self, name: impl Into<String>) -> Self {
        self.next.push(name.into());
        self
    }

    /// Set an operator parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up an operator parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_input(&self) -> bool {
        self.operator == INPUT_OPERATOR
    }

    pub fn is_output(&self) -> bool {
        self.operator == OUTPUT_OPERATOR
    }
}

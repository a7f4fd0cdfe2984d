// OperatorRegistry — operator type name → constructor
//
// The net builder resolves every node's `operator` field here. The default
// registry knows the reference operators; hosts can add their own types (or
// replace a built-in) before building a net.

use std::collections::BTreeMap;
use std::fmt;

use wren_core::error::{Error, Result};
use wren_core::{Node, INPUT_OPERATOR, OUTPUT_OPERATOR};

use crate::operator::Operator;
use crate::ops::{
    Activation, BatchNormOp, FullyConnected, Input, LossFunction, Output, Summator, UserLayer,
};

/// Builds the operator for one node from its description.
pub type OperatorCtor = Box<dyn Fn(&Node) -> Result<Box<dyn Operator>> + Send + Sync>;

pub struct OperatorRegistry {
    ctors: BTreeMap<String, OperatorCtor>,
}

impl OperatorRegistry {
    /// A registry with no operator types at all.
    pub fn empty() -> Self {
        OperatorRegistry {
            ctors: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, ctor: F)
    where
        F: Fn(&Node) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
    {
        self.ctors.insert(kind.into(), Box::new(ctor));
    }

    /// Construct the operator for `node`.
    pub fn create(&self, node: &Node) -> Result<Box<dyn Operator>> {
        let ctor = self
            .ctors
            .get(&node.operator)
            .ok_or_else(|| Error::UnknownOperator {
                node: node.name.clone(),
                operator: node.operator.clone(),
            })?;
        ctor(node)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.ctors.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.ctors.keys().map(String::as_str).collect()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut reg = OperatorRegistry::empty();
        reg.register(INPUT_OPERATOR, |_| Ok(Box::new(Input) as Box<dyn Operator>));
        reg.register(OUTPUT_OPERATOR, |_| Ok(Box::new(Output) as Box<dyn Operator>));
        reg.register("FullyConnected", |n| {
            Ok(Box::new(FullyConnected::from_node(n)?) as Box<dyn Operator>)
        });
        reg.register("Activation", |n| {
            Ok(Box::new(Activation::from_node(n)?) as Box<dyn Operator>)
        });
        reg.register("Summator", |_| Ok(Box::new(Summator) as Box<dyn Operator>));
        reg.register("LossFunction", |n| {
            Ok(Box::new(LossFunction::from_node(n)?) as Box<dyn Operator>)
        });
        reg.register("BatchNorm", |n| {
            Ok(Box::new(BatchNormOp::from_node(n)?) as Box<dyn Operator>)
        });
        reg.register("UserLayer", |n| {
            Ok(Box::new(UserLayer::from_node(n)?) as Box<dyn Operator>)
        });
        reg
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kinds() {
        let reg = OperatorRegistry::default();
        for kind in [
            "Input",
            "Output",
            "FullyConnected",
            "Activation",
            "Summator",
            "LossFunction",
            "BatchNorm",
            "UserLayer",
        ] {
            assert!(reg.contains(kind), "missing {kind}");
        }
    }

    #[test]
    fn test_create_unknown() {
        let reg = OperatorRegistry::default();
        let err = reg.create(&Node::new("c1", "Convolution")).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Error createNet: not found operator 'Convolution' for node 'c1'"
        );
    }

    #[test]
    fn test_create_passes_params() {
        let reg = OperatorRegistry::default();
        assert!(reg.create(&Node::new("fc", "FullyConnected")).is_err());
        let op = reg
            .create(&Node::new("fc", "FullyConnected").with_param("units", "2"))
            .unwrap();
        assert_eq!(op.kind(), "FullyConnected");
    }

    #[test]
    fn test_register_custom() {
        let mut reg = OperatorRegistry::empty();
        assert!(reg.kinds().is_empty());
        reg.register("Identity", |_| Ok(Box::new(Summator) as Box<dyn Operator>));
        assert_eq!(reg.kinds(), vec!["Identity"]);
    }
}

// NetDescription — serializable form of a net's node collection
//
// JSON layout:
//
//   {
//     "name": "mlp",
//     "nodes": [
//       { "name": "BeginNet", "operator": "Input", "next": ["fc1"] },
//       { "name": "fc1", "operator": "FullyConnected",
//         "params": { "units": "10" },
//         "prev": ["BeginNet"], "next": ["EndNet"] },
//       { "name": "EndNet", "operator": "Output", "prev": ["fc1"] }
//     ]
//   }
//
// Adjacency is spelled out in both directions; the validator checks that the
// two directions agree. `Net::architecture` writes the same layout back out.

use serde::{Deserialize, Serialize};

use wren_core::error::{Error, Result};
use wren_core::Node;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDescription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub nodes: Vec<Node>,
}

impl NetDescription {
    pub fn new(nodes: Vec<Node>) -> Self {
        NetDescription {
            name: String::new(),
            nodes,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Decode a description from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Description(e.to_string()))
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Description(e.to_string()))
    }

    /// Find a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

impl From<Vec<Node>> for NetDescription {
    fn from(nodes: Vec<Node>) -> Self {
        NetDescription::new(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MLP: &str = r#"{
        "name": "mlp",
        "nodes": [
            { "name": "BeginNet", "operator": "Input", "next": ["fc1"] },
            { "name": "fc1", "operator": "FullyConnected",
              "params": { "units": "4", "bias": "false" },
              "prev": ["BeginNet"], "next": ["EndNet"] },
            { "name": "EndNet", "operator": "Output", "prev": ["fc1"] }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let d = NetDescription::from_json(MLP).unwrap();
        assert_eq!(d.name, "mlp");
        assert_eq!(d.nodes.len(), 3);
        let fc = d.node("fc1").unwrap();
        assert_eq!(fc.param("units"), Some("4"));
        assert_eq!(fc.prev, vec!["BeginNet".to_string()]);
        assert!(d.node("BeginNet").unwrap().prev.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let d = NetDescription::from_json(MLP).unwrap();
        let again = NetDescription::from_json(&d.to_json().unwrap()).unwrap();
        assert_eq!(d, again);
    }

    #[test]
    fn test_bad_json() {
        let err = NetDescription::from_json("{ \"nodes\": 3 }").unwrap_err();
        assert!(matches!(err, Error::Description(_)));
    }
}

//! Diagram wire format.
//!
//! ```json
//! {
//!   "nodes": [{"id": "n1", "type": "AND", "inputs": 2, "outputs": 1, "params": {}}],
//!   "edges": [{"fromNode": "n1", "fromPort": 0, "toNode": "n2", "toPort": 0}]
//! }
//! ```
//!
//! Some diagram editors double-encode on save, so `decode` accepts either a
//! native object or a JSON string containing one. Saving and reloading a
//! decoded diagram reproduces the same topology.

use crate::error::DiagramError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub inputs: usize,
    #[serde(default)]
    pub outputs: usize,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from_node: String,
    pub from_port: usize,
    pub to_node: String,
    pub to_port: usize,
}

impl Diagram {
    /// Decode a stored `diagram_json` value. Null is an empty diagram.
    pub fn decode(raw: &Value) -> Result<Self, DiagramError> {
        match raw {
            Value::Null => Ok(Self::default()),
            Value::String(s) if s.trim().is_empty() => Ok(Self::default()),
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| DiagramError::Malformed(e.to_string()))
            }
            other => serde_json::from_value(other.clone())
                .map_err(|e| DiagramError::Malformed(e.to_string())),
        }
    }
}

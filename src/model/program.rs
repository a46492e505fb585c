//! User programs: FBD diagrams and scripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A named function-block diagram.
///
/// `diagram_json` stores the wire format verbatim — either a JSON object
/// `{nodes, edges}` or a JSON string encoding one (some editors double-encode
/// on save); the executor tolerates both. `runtime_values` is the flattened
/// `"<node>_out_<port>"` map persisted after each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FbdProgram {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub diagram_json: Value,
    /// Node id → point id, for I/O blocks.
    #[serde(default)]
    pub bindings: HashMap<String, i64>,
    #[serde(default)]
    pub runtime_values: Map<String, Value>,
    /// Per-node latch/timer/counter memory, carried across cycles.
    #[serde(default)]
    pub runtime_state: Map<String, Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FbdProgram {
    pub fn named(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            is_active: true,
            diagram_json: Value::Null,
            bindings: HashMap::new(),
            runtime_values: Map::new(),
            runtime_state: Map::new(),
            updated_at: None,
        }
    }
}

/// A textual script program (declaration header + sandboxed body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptProgram {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub code_text: String,
    pub is_active: bool,
    pub last_execution_status: Option<String>,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub last_execution_log: Option<String>,
}

impl ScriptProgram {
    pub fn named(id: i64, name: &str, code: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            code_text: code.to_string(),
            is_active: true,
            last_execution_status: None,
            last_execution_time: None,
            last_execution_log: None,
        }
    }
}

/// Whether a script variable reads from or writes to its point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindDirection {
    Input,
    Output,
}

/// Binds one declared script variable to a point. Variable names are unique
/// per script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptBinding {
    pub id: i64,
    pub script_id: i64,
    pub variable_name: String,
    pub point_id: i64,
    pub direction: BindDirection,
}

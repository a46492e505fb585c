//! Script execution and validation.
//!
//! One executor instance owns the sandboxed engine and is reused across
//! programs and cycles. Execution marshals declared I/O through the scope:
//! inputs and outputs are seeded from their bound points before the run,
//! and on success each `*_output` variable's final value is handed back as
//! a point write. Any parse or evaluation error marks the run `error` and
//! nothing is written.

use super::header::{Declaration, parse_header};
use super::sandbox::build_engine;
use crate::coerce;
use crate::model::{BindDirection, ScriptBinding};
use log::debug;
use rhai::{Dynamic, Engine, Scope};
use serde::Serialize;
use std::collections::HashMap;

// ───────────────────────────────────────────────────────────────
// Outcomes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    Error,
}

impl ExecStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Result of one execution: status, human-readable log, and the point
/// writes to apply (empty unless the run succeeded).
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    pub log: String,
    pub outputs: Vec<(i64, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

/// Result of compiling a script without running it.
#[derive(Debug, Clone)]
pub struct Validation {
    pub status: ValidationStatus,
    pub declarations: Vec<Declaration>,
    pub error: Option<String>,
    pub line: Option<usize>,
}

// ───────────────────────────────────────────────────────────────
// Executor
// ───────────────────────────────────────────────────────────────

pub struct ScriptExecutor {
    engine: Engine,
}

impl ScriptExecutor {
    pub fn new(max_operations: u64) -> Self {
        Self { engine: build_engine(max_operations) }
    }

    /// Parse the header and compile the body without executing anything.
    pub fn validate(&self, code: &str) -> Validation {
        let parsed = parse_header(code);
        match self.engine.compile(&parsed.body) {
            Ok(_) => Validation {
                status: ValidationStatus::Valid,
                declarations: parsed.declarations,
                error: None,
                line: None,
            },
            Err(e) => Validation {
                status: ValidationStatus::Invalid,
                declarations: parsed.declarations,
                line: e.1.line(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Run a script once. `read_point` supplies the current value of a
    /// bound point as text.
    pub fn execute(
        &self,
        code: &str,
        bindings: &[ScriptBinding],
        read_point: impl Fn(i64) -> Option<String>,
    ) -> ExecOutcome {
        let parsed = parse_header(code);

        let ast = match self.engine.compile(&parsed.body) {
            Ok(ast) => ast,
            Err(e) => {
                return ExecOutcome {
                    status: ExecStatus::Error,
                    log: format!("Exec Error: {e}"),
                    outputs: Vec::new(),
                };
            }
        };

        let binding_map: HashMap<&str, &ScriptBinding> = bindings
            .iter()
            .map(|b| (b.variable_name.as_str(), b))
            .collect();

        // Seed the scope: inputs and outputs both start from the bound
        // point's current value, defaulting to false / 0.0 when unbound.
        let mut scope = Scope::new();
        for decl in &parsed.declarations {
            let current = binding_map
                .get(decl.name.as_str())
                .and_then(|b| read_point(b.point_id));
            if decl.kind.is_digital() {
                scope.set_value(decl.name.as_str(), coerce::to_bool(current.as_deref()));
            } else {
                scope.set_value(decl.name.as_str(), coerce::to_f64(current.as_deref()));
            }
        }

        if let Err(e) = self.engine.run_ast_with_scope(&mut scope, &ast) {
            return ExecOutcome {
                status: ExecStatus::Error,
                log: format!("Exec Error: {e}"),
                outputs: Vec::new(),
            };
        }

        // A header-only script succeeds but has assigned nothing, so no
        // writes leave the sandbox.
        let mut outputs = Vec::new();
        if !parsed.body_is_empty() {
            for decl in &parsed.declarations {
                if !decl.kind.is_output() {
                    continue;
                }
                let Some(binding) = binding_map.get(decl.name.as_str()) else {
                    continue;
                };
                if binding.direction != BindDirection::Output {
                    debug!(
                        "script output {} bound as input; skipping write",
                        decl.name
                    );
                    continue;
                }
                if let Some(value) = scope.get(decl.name.as_str()) {
                    outputs.push((binding.point_id, dynamic_to_text(value)));
                }
            }
        }

        ExecOutcome {
            status: ExecStatus::Success,
            log: "Execution completed successfully.".to_string(),
            outputs,
        }
    }
}

/// Stringify a scope value the way `write_value` expects: booleans as
/// true/false, floats in shortest form.
fn dynamic_to_text(value: &Dynamic) -> String {
    if let Ok(b) = value.as_bool() {
        return b.to_string();
    }
    if let Ok(i) = value.as_int() {
        return i.to_string();
    }
    if let Ok(f) = value.as_float() {
        return format!("{f}");
    }
    value.to_string()
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

//! Control operations, transport-free.
//!
//! Every operation takes the shared engine, produces a JSON body, and lets
//! the adapter decide status codes. Validation always succeeds at the
//! transport level — invalid scripts are an in-body `status`, not an HTTP
//! error.

use super::{SharedEngine, lock};
use crate::error::Result;
use serde_json::{Value, json};

/// `POST /script/programs/{id}/validate`
pub fn validate_script(engine: &SharedEngine, id: i64) -> Result<Value> {
    let mut guard = lock(engine);
    let validation = guard.validate_script(id)?;
    let mut body = json!({
        "status": validation.status,
        "declarations": validation.declarations,
    });
    if let Some(error) = validation.error {
        body["error"] = json!(error);
    }
    if let Some(line) = validation.line {
        body["line"] = json!(line);
    }
    Ok(body)
}

/// `POST /script/programs/{id}/execute`
pub fn execute_script(engine: &SharedEngine, id: i64) -> Result<Value> {
    let mut guard = lock(engine);
    let (status, log) = guard.execute_script_once(id)?;
    Ok(json!({ "status": status, "log": log }))
}

/// `POST /fbd/programs/{id}/execute`
pub fn execute_fbd(engine: &SharedEngine, id: i64) -> Result<Value> {
    let mut guard = lock(engine);
    let name = guard
        .store()
        .fbd_program(id)
        .map(|p| p.name)
        .unwrap_or_default();
    let results = guard.execute_fbd_once(id)?;
    Ok(json!({ "status": "executed", "program": name, "results": results }))
}

/// `GET /fbd/programs/{id}/runtime`
pub fn fbd_runtime(engine: &SharedEngine, id: i64) -> Result<Value> {
    let guard = lock(engine);
    let program = guard
        .store()
        .fbd_program(id)
        .ok_or(crate::error::StoreError::NotFound("fbd program", id))?;
    Ok(Value::Object(program.runtime_values))
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

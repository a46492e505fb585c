//! Configuration store — the hexagonal boundary between the engine and
//! persistence.
//!
//! ```text
//!   Field driver ──▶ registers ─┐
//!   Control plane ─▶ entities ──┼──▶ ConfigStore ──▶ Engine (domain)
//!   Engine ───▶ runtime fields ─┘
//! ```
//!
//! The engine consumes the [`ConfigStore`] trait only; [`MemStore`] is the
//! in-process implementation backed by a JSON snapshot file. Reads return
//! owned clones so each phase works against a stable snapshot.

mod memory;

pub use memory::MemStore;

use crate::error::StoreError;
use crate::model::{
    Alarm, AlarmSeverity, Device, Event, EventSeverity, Fault, FbdProgram, Log, Point, PointGroup,
    Register, RegisterStatus, ScriptBinding, ScriptProgram,
};
use serde_json::{Map, Value};

// ───────────────────────────────────────────────────────────────
// Data queries (DATA points)
// ───────────────────────────────────────────────────────────────

/// The closed set of entities a DATA point may aggregate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEntity {
    Devices,
    Registers,
    Points,
    Alarms,
    Events,
    Logs,
    Faults,
}

impl QueryEntity {
    fn from_model(name: &str) -> Option<Self> {
        let n = name.trim().to_ascii_lowercase();
        Some(match n.trim_end_matches('s') {
            "device" => Self::Devices,
            "register" => Self::Registers,
            "point" => Self::Points,
            "alarm" => Self::Alarms,
            "event" => Self::Events,
            "log" => Self::Logs,
            "fault" => Self::Faults,
            _ => return None,
        })
    }
}

/// A parsed DATA-point query. Anything outside this set is rejected at
/// parse time and the point resolves to 0.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQuery {
    Count(QueryEntity),
    Sum { entity: QueryEntity, field: String },
    FilteredCount { entity: QueryEntity, field: String, equals: Value },
}

impl DataQuery {
    /// Parse the stored `json_data` descriptor:
    /// `{model, action?, params?, return ∈ {count, sum}, field?}`.
    pub fn parse(json_data: &str) -> Option<Self> {
        let v: Value = serde_json::from_str(json_data).ok()?;
        let obj = v.as_object()?;
        let entity = QueryEntity::from_model(obj.get("model")?.as_str()?)?;
        match obj.get("return")?.as_str()? {
            "count" => {
                if obj.get("action").and_then(Value::as_str) == Some("filter") {
                    let params = obj.get("params")?.as_object()?;
                    let (field, equals) = params.iter().next()?;
                    Some(Self::FilteredCount {
                        entity,
                        field: field.clone(),
                        equals: equals.clone(),
                    })
                } else {
                    Some(Self::Count(entity))
                }
            }
            "sum" => {
                let field = obj
                    .get("field")
                    .and_then(Value::as_str)
                    .unwrap_or("value")
                    .to_string();
                Some(Self::Sum { entity, field })
            }
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Duplication
// ───────────────────────────────────────────────────────────────

/// Entity targeted by the generic duplication operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateTarget {
    Device(i64),
    PointGroup(i64),
    FbdProgram(i64),
    ScriptProgram(i64),
}

// ───────────────────────────────────────────────────────────────
// The store port
// ───────────────────────────────────────────────────────────────

/// Persistence seam consumed by the engine and the control API.
///
/// Read methods return owned clones in ascending-id order; write methods
/// are the only paths through which runtime fields change.
pub trait ConfigStore: Send {
    // ── Entity reads ──────────────────────────────────────────
    fn devices(&self) -> Vec<Device>;
    fn registers(&self) -> Vec<Register>;
    fn register(&self, id: i64) -> Option<Register>;
    fn point_groups(&self) -> Vec<PointGroup>;
    fn points(&self) -> Vec<Point>;
    fn point(&self, id: i64) -> Option<Point>;
    fn points_in_group(&self, group_id: i64) -> Vec<Point>;
    fn registers_of_device(&self, device_id: i64) -> Vec<Register>;
    /// Active points in ascending-id order (the P1 iteration set).
    fn active_points(&self) -> Vec<Point>;
    fn fbd_programs(&self) -> Vec<FbdProgram>;
    fn fbd_program(&self, id: i64) -> Option<FbdProgram>;
    fn active_fbd_programs(&self) -> Vec<FbdProgram>;
    fn script_programs(&self) -> Vec<ScriptProgram>;
    fn script_program(&self, id: i64) -> Option<ScriptProgram>;
    fn active_script_programs(&self) -> Vec<ScriptProgram>;
    fn script_bindings(&self, script_id: i64) -> Vec<ScriptBinding>;

    // ── Runtime writes (engine-owned fields) ──────────────────
    /// Bulk-persist new `read_value`s; refreshes `last_updated` on each.
    fn bulk_update_read_values(&mut self, updates: &[(i64, String)]) -> Result<(), StoreError>;
    fn set_point_write_value(&mut self, point_id: i64, value: &str) -> Result<(), StoreError>;
    fn update_fbd_runtime(
        &mut self,
        program_id: i64,
        values: Map<String, Value>,
        state: Map<String, Value>,
    ) -> Result<(), StoreError>;
    fn update_script_execution(
        &mut self,
        script_id: i64,
        status: &str,
        log: &str,
    ) -> Result<(), StoreError>;
    /// Replace only the execution log (validation results land here).
    fn update_script_log(&mut self, script_id: i64, log: &str) -> Result<(), StoreError>;

    // ── History ───────────────────────────────────────────────
    /// Raise an alarm unless an active one with the same (point, name)
    /// already exists. Returns true when a new row was created.
    fn raise_alarm(
        &mut self,
        point_id: Option<i64>,
        name: &str,
        description: &str,
        severity: AlarmSeverity,
    ) -> bool;
    /// Close every active alarm on `point_id` whose name starts with
    /// `prefix` (hardware-error auto-clear).
    fn close_alarms_with_prefix(&mut self, point_id: i64, prefix: &str);
    fn acknowledge_alarm(&mut self, alarm_id: i64, actor: &str) -> Result<(), StoreError>;
    fn clear_alarm(&mut self, alarm_id: i64, actor: &str) -> Result<(), StoreError>;
    fn append_event(
        &mut self,
        point_id: Option<i64>,
        event_type: &str,
        description: &str,
        severity: EventSeverity,
    );
    fn append_log(&mut self, point_id: Option<i64>, source: &str, value: &str, message: &str);
    fn append_fault(&mut self, device_id: i64, point_id: Option<i64>, description: &str) -> i64;
    fn resolve_fault(&mut self, fault_id: i64) -> Result<(), StoreError>;
    fn alarms(&self) -> Vec<Alarm>;
    fn events(&self) -> Vec<Event>;
    fn logs(&self) -> Vec<Log>;
    fn faults(&self) -> Vec<Fault>;

    // ── Aggregates (DATA points) ──────────────────────────────
    fn data_query(&self, query: &DataQuery) -> f64;

    // ── Field-driver contract ─────────────────────────────────
    /// The driver owns register values; the engine never calls this.
    fn set_register_value(&mut self, register_id: i64, value: &str) -> Result<(), StoreError>;
    fn set_register_status(
        &mut self,
        register_id: i64,
        status: RegisterStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError>;

    // ── Administration ────────────────────────────────────────
    /// Clone `target` `count` times, optionally with its immediate
    /// children; name collisions get a counter suffix. Returns new ids.
    fn duplicate(
        &mut self,
        target: DuplicateTarget,
        count: usize,
        include_children: bool,
        names: &[String],
    ) -> Result<Vec<i64>, StoreError>;

    /// Write the snapshot back to its backing file (no-op for `mem:`).
    fn flush(&mut self) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_count_query() {
        let q = DataQuery::parse(r#"{"model": "alarms", "return": "count"}"#).unwrap();
        assert_eq!(q, DataQuery::Count(QueryEntity::Alarms));
    }

    #[test]
    fn parses_sum_query_with_default_field() {
        let q = DataQuery::parse(r#"{"model": "Log", "return": "sum"}"#).unwrap();
        assert_eq!(
            q,
            DataQuery::Sum { entity: QueryEntity::Logs, field: "value".to_string() }
        );
    }

    #[test]
    fn parses_filtered_count() {
        let q = DataQuery::parse(
            r#"{"model": "alarms", "action": "filter", "params": {"is_active": true}, "return": "count"}"#,
        )
        .unwrap();
        assert_eq!(
            q,
            DataQuery::FilteredCount {
                entity: QueryEntity::Alarms,
                field: "is_active".to_string(),
                equals: json!(true),
            }
        );
    }

    #[test]
    fn rejects_unknown_models_and_returns() {
        assert!(DataQuery::parse(r#"{"model": "users", "return": "count"}"#).is_none());
        assert!(DataQuery::parse(r#"{"model": "points", "return": "avg"}"#).is_none());
        assert!(DataQuery::parse("not json").is_none());
    }
}

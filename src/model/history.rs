//! Alarm, event, log and fault history rows. All append-only except for the
//! alarm lifecycle flags (acknowledge / clear).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// An ack-able condition derived from point values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub point_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub severity: AlarmSeverity,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_time: Option<DateTime<Utc>>,
    pub is_cleared: bool,
    pub cleared_by: Option<String>,
    pub cleared_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// An informational state-change record; requires no acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub point_id: Option<i64>,
    /// Free-text code, e.g. "STATE_CHANGE", "VALUE_CHANGE".
    pub event_type: String,
    pub description: String,
    pub severity: EventSeverity,
    pub timestamp: DateTime<Utc>,
}

/// A historical trend sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    pub point_id: Option<i64>,
    /// Semantic source: "State_Change", "Historical_Log", "Initial_Log", …
    pub source: String,
    pub value: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A hardware condition against a device that prevents trustworthy
/// measurement. Raised by the field driver, resolved by operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub id: i64,
    pub device_id: i64,
    pub point_id: Option<i64>,
    pub description: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

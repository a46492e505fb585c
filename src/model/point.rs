//! Points — the engineering-unit view consumed by user logic.

use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// A logical bucket of points, totally ordered by `order_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGroup {
    pub id: i64,
    pub name: String,
    /// Unique integer key giving the group list a stable total order.
    pub order_key: i64,
}

/// How a point obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PointType {
    /// Bound to a hardware register.
    Register,
    /// Free variable written by programs or the control plane.
    Variable,
    /// Derived from a store aggregate query (`json_data`).
    Data,
}

/// Declared data type of a point or register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Real,
    Boolean,
    String,
    List,
    Object,
}

impl DataType {
    /// Integer, Float and Real all take the numeric processing path.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Real)
    }
}

/// Direction of a hardware-linked point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoDirection {
    Input,
    Output,
}

/// The engineering-unit abstraction over registers and derived data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    // ── Identity ──────────────────────────────────────────────
    pub id: i64,
    pub name: String,
    /// Unique within the group.
    pub slug: String,
    pub group_id: Option<i64>,
    pub point_type: PointType,

    // ── Hardware link ─────────────────────────────────────────
    pub register_id: Option<i64>,
    pub direction: IoDirection,
    pub is_active: bool,
    /// Driver poll interval hint, milliseconds.
    pub polling_ms: Option<u32>,

    // ── Typing ────────────────────────────────────────────────
    pub data_type: DataType,
    pub bit_width: Option<u8>,
    /// Bit index extracted from multistate registers.
    pub bit: u8,
    pub is_single_bit: bool,

    // ── Forcing ───────────────────────────────────────────────
    pub is_forced: bool,
    pub forced_value: Option<String>,

    // ── Scaling ───────────────────────────────────────────────
    pub gain: f64,
    pub offset: f64,
    pub offset_before_gain: bool,
    pub decimal_places: u32,
    pub unit: Option<String>,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub scale_min: Option<f64>,
    pub scale_max: Option<f64>,

    // ── Logic ─────────────────────────────────────────────────
    pub threshold_high: Option<f64>,
    pub threshold_low: Option<f64>,
    pub pulse_width_ms: Option<u32>,
    pub may_be_faulty: bool,
    /// The value this point reads while its register is faulted.
    pub faulty_value: f64,

    // ── Runtime (engine-owned) ────────────────────────────────
    pub read_value: Option<String>,
    pub write_value: Option<String>,
    /// Query descriptor for `Data` points.
    pub json_data: Option<String>,
    pub error_status: super::RegisterStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_communication: Option<DateTime<Utc>>,
}

impl Point {
    /// A skeleton point for construction sites and tests; callers override
    /// the fields they care about.
    pub fn named(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            group_id: None,
            point_type: PointType::Variable,
            register_id: None,
            direction: IoDirection::Input,
            is_active: true,
            polling_ms: None,
            data_type: DataType::Float,
            bit_width: None,
            bit: 0,
            is_single_bit: false,
            is_forced: false,
            forced_value: None,
            gain: 1.0,
            offset: 0.0,
            offset_before_gain: false,
            decimal_places: 2,
            unit: None,
            range_min: None,
            range_max: None,
            scale_min: None,
            scale_max: None,
            threshold_high: None,
            threshold_low: None,
            pulse_width_ms: None,
            may_be_faulty: false,
            faulty_value: 0.0,
            read_value: None,
            write_value: None,
            json_data: None,
            error_status: super::RegisterStatus::Ok,
            last_updated: None,
            last_communication: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved values
// ---------------------------------------------------------------------------

/// A point value after resolution, typed per the point's declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PointValue {
    /// Numeric view; booleans map to 0/1, text parses or falls back to 0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => crate::coerce::to_f64(Some(s)),
        }
    }

    /// Boolean view with the standard coercion rules.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i > 0,
            Self::Float(f) => *f > 0.5,
            Self::Text(s) => crate::coerce::to_bool(Some(s)),
        }
    }

    /// JSON view for FBD wires and runtime maps.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::json!(i),
            Self::Float(f) => serde_json::json!(f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for PointValue {
    /// The canonical `read_value` text: floats in shortest form ("87.5",
    /// "42"), booleans as "true"/"false".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

//! Point processor — raw register data to engineering units.
//!
//! [`resolve`] runs **every tick for every active point, before any program
//! reads it**. It is a pure function: alarms, events and trend logs come out
//! as [`SideEffect`] records that the scheduler applies in deterministic
//! order, and the processor itself performs no I/O.
//!
//! Resolution precedence (first match wins):
//!
//! 1. Manual force — `forced_value` coerced to the declared type.
//! 2. Hardware error — register status ≠ OK raises a HIGH alarm and the
//!    point reads its `faulty_value` (or 0).
//! 3. By point type — register calibration/scaling, variable coercion, or a
//!    store aggregate query.

use crate::coerce;
use crate::model::{
    AlarmSeverity, DataType, EventSeverity, Point, PointType, PointValue, Register, SignalClass,
};
use crate::store::DataQuery;

// ───────────────────────────────────────────────────────────────
// Side effects
// ───────────────────────────────────────────────────────────────

/// A deferred history write produced while resolving one point.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    RaiseAlarm {
        name: String,
        description: String,
        severity: AlarmSeverity,
    },
    /// Close active alarms whose name starts with `prefix` (hardware
    /// recovery).
    ClearAlarms { prefix: &'static str },
    AppendEvent {
        event_type: &'static str,
        description: String,
        severity: EventSeverity,
    },
    AppendLog {
        source: &'static str,
        value: String,
        message: String,
    },
}

/// The outcome of resolving one point for one cycle.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub value: PointValue,
    pub effects: Vec<SideEffect>,
}

// ───────────────────────────────────────────────────────────────
// Coercion into the declared type
// ───────────────────────────────────────────────────────────────

/// Coerce raw text into a typed value per the point's declaration.
pub fn coerce_to_type(raw: Option<&str>, data_type: DataType) -> PointValue {
    match data_type {
        DataType::Boolean => PointValue::Bool(coerce::to_bool(raw)),
        DataType::Integer => PointValue::Int(coerce::to_i64(raw)),
        DataType::Float | DataType::Real => PointValue::Float(coerce::to_f64(raw)),
        DataType::String | DataType::List | DataType::Object => {
            PointValue::Text(raw.unwrap_or_default().to_string())
        }
    }
}

fn value_from_f64(data_type: DataType, v: f64) -> PointValue {
    match data_type {
        DataType::Boolean => PointValue::Bool(v > 0.5),
        DataType::Integer => PointValue::Int(v as i64),
        _ => PointValue::Float(v),
    }
}

fn round_dp(v: f64, decimal_places: u32) -> f64 {
    let k = 10f64.powi(decimal_places as i32);
    (v * k).round() / k
}

// ───────────────────────────────────────────────────────────────
// Resolution
// ───────────────────────────────────────────────────────────────

/// Resolve one point against the cycle snapshot.
///
/// `register` is the point's linked register, if any; `data_source` answers
/// DATA-point aggregate queries against the store.
pub fn resolve(
    point: &Point,
    register: Option<&Register>,
    data_source: impl Fn(&DataQuery) -> f64,
) -> Resolution {
    // 1. Manual force wins over everything, and never alarms by itself.
    if point.is_forced {
        return Resolution {
            value: coerce_to_type(point.forced_value.as_deref(), point.data_type),
            effects: Vec::new(),
        };
    }

    let mut effects = Vec::new();

    // 2. Hardware error propagation.
    if point.point_type == PointType::Register {
        if let Some(reg) = register {
            if !reg.error_status.is_ok() {
                effects.push(SideEffect::RaiseAlarm {
                    name: format!("Hardware Error: {}", reg.error_status),
                    description: reg
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "Register Fault".to_string()),
                    severity: AlarmSeverity::High,
                });
                let fallback = if point.may_be_faulty { point.faulty_value } else { 0.0 };
                return Resolution {
                    value: value_from_f64(point.data_type, fallback),
                    effects,
                };
            }
            // Status is back to OK: close any lingering hardware alarm.
            effects.push(SideEffect::ClearAlarms { prefix: "Hardware Error:" });
        }
    }

    // 3. Resolve by point type.
    let value = match point.point_type {
        PointType::Register => resolve_register(point, register),
        PointType::Variable => coerce_to_type(point.read_value.as_deref(), point.data_type),
        PointType::Data => {
            let result = point
                .json_data
                .as_deref()
                .and_then(DataQuery::parse)
                .map_or(0.0, |q| data_source(&q));
            value_from_f64(point.data_type, result)
        }
    };

    // 4. Thresholds, change events, trend logs.
    check_logic(point, &value, &mut effects);

    Resolution { value, effects }
}

/// Interpret the raw register text per the point's instructions.
///
/// A missing or inactive register resolves to the type fallback — the
/// processor never invents a reading.
fn resolve_register(point: &Point, register: Option<&Register>) -> PointValue {
    let Some(reg) = register.filter(|r| r.is_active) else {
        return coerce_to_type(None, point.data_type);
    };
    let raw = coerce::to_f64(reg.current_value.as_deref());

    if point.data_type == DataType::Boolean {
        let on = match reg.signal_class {
            SignalClass::Multistate if point.is_single_bit => {
                ((raw as i64) >> point.bit) & 1 == 1
            }
            _ => raw > 0.5,
        };
        return PointValue::Bool(on);
    }

    if point.data_type.is_numeric() {
        // Calibration (gain/offset).
        let cal = if point.offset_before_gain {
            (raw + point.offset) * point.gain
        } else {
            raw * point.gain + point.offset
        };

        // Range-to-scale extrapolation, only when all four bounds exist.
        let scaled = match (point.range_min, point.range_max, point.scale_min, point.scale_max) {
            (Some(r_min), Some(r_max), Some(s_min), Some(s_max)) if r_max != r_min => {
                s_min + (cal - r_min) * (s_max - s_min) / (r_max - r_min)
            }
            _ => cal,
        };

        return if point.data_type == DataType::Integer {
            PointValue::Int(scaled as i64)
        } else {
            PointValue::Float(round_dp(scaled, point.decimal_places))
        };
    }

    PointValue::Text(reg.current_value.clone().unwrap_or_default())
}

/// Threshold alarms, the 1 % range event, the 2 % scale log, and the
/// initial-encounter log — all relative to the previously stored
/// `read_value`.
fn check_logic(point: &Point, current: &PointValue, effects: &mut Vec<SideEffect>) {
    let previous = point
        .read_value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match point.data_type {
        DataType::Boolean => {
            let now = current.as_bool();
            let changed = previous.is_some_and(|old| coerce::to_bool(Some(old)) != now);
            if changed {
                let status = if now { "ON" } else { "OFF" };
                effects.push(SideEffect::AppendEvent {
                    event_type: "STATE_CHANGE",
                    description: format!("{} is {}", point.name, status),
                    severity: EventSeverity::Info,
                });
                effects.push(SideEffect::AppendLog {
                    source: "State_Change",
                    value: current.to_string(),
                    message: format!("{} recorded as {}", point.name, current),
                });
            }
            if point.may_be_faulty && now == (point.faulty_value > 0.5) {
                effects.push(SideEffect::RaiseAlarm {
                    name: "Fault Condition".to_string(),
                    description: format!("{} in faulty state", point.name),
                    severity: AlarmSeverity::High,
                });
            }
        }

        dt if dt.is_numeric() => {
            let now = current.as_f64();
            let old = previous.map(|s| coerce::to_f64(Some(s)));
            let changed = old.is_some_and(|o| o != now);

            // Warning margin exists only when both thresholds are set.
            let margin = match (point.threshold_high, point.threshold_low) {
                (Some(h), Some(l)) => (h - l).abs() * 0.10,
                _ => 0.0,
            };

            if let Some(t_high) = point.threshold_high {
                if now >= t_high {
                    effects.push(SideEffect::RaiseAlarm {
                        name: "Threshold Violation".to_string(),
                        description: format!("{} exceeded high limit ({t_high})", point.name),
                        severity: AlarmSeverity::Critical,
                    });
                } else if margin > 0.0 && now >= t_high - margin {
                    effects.push(SideEffect::RaiseAlarm {
                        name: "Threshold Warning".to_string(),
                        description: format!("{} approaching high limit", point.name),
                        severity: AlarmSeverity::Medium,
                    });
                }
            }
            if let Some(t_low) = point.threshold_low {
                if now <= t_low {
                    effects.push(SideEffect::RaiseAlarm {
                        name: "Threshold Violation".to_string(),
                        description: format!("{} fell below low limit ({t_low})", point.name),
                        severity: AlarmSeverity::Critical,
                    });
                } else if margin > 0.0 && now <= t_low + margin {
                    effects.push(SideEffect::RaiseAlarm {
                        name: "Threshold Warning".to_string(),
                        description: format!("{} approaching low limit", point.name),
                        severity: AlarmSeverity::Medium,
                    });
                }
            }

            // 1 % of the raw range: a value-change event.
            if let (Some(r_min), Some(r_max), Some(o), true) =
                (point.range_min, point.range_max, old, changed)
            {
                let span = (r_max - r_min).abs();
                if span > 0.0 && (now - o).abs() / span >= 0.01 {
                    effects.push(SideEffect::AppendEvent {
                        event_type: "VALUE_CHANGE",
                        description: format!("{} shifted to {}", point.name, current),
                        severity: EventSeverity::Info,
                    });
                }
            }

            // 2 % of the engineering scale: a trend log.
            if let (Some(s_min), Some(s_max), Some(o), true) =
                (point.scale_min, point.scale_max, old, changed)
            {
                let span = (s_max - s_min).abs();
                if span > 0.0 && (now - o).abs() / span >= 0.02 {
                    effects.push(SideEffect::AppendLog {
                        source: "Historical_Log",
                        value: current.to_string(),
                        message: format!("{} recorded as {}", point.name, current),
                    });
                }
            }
        }

        _ => {}
    }

    // First encounter: the previous read_value was null.
    if previous.is_none() {
        effects.push(SideEffect::AppendLog {
            source: "Initial_Log",
            value: current.to_string(),
            message: format!("{} recorded as {}", point.name, current),
        });
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionClass, IoDirection, RegisterStatus};

    fn no_data(_: &DataQuery) -> f64 {
        panic!("data source should not be consulted")
    }

    fn analog_register(id: i64, value: &str) -> Register {
        Register {
            id,
            device_id: 1,
            address: 40_001,
            function_class: FunctionClass::Read,
            signal_class: SignalClass::Analog,
            direction: IoDirection::Input,
            data_type: DataType::Float,
            current_value: Some(value.to_string()),
            calibration: None,
            is_active: true,
            error_status: RegisterStatus::Ok,
            error_message: None,
            last_updated: None,
        }
    }

    #[test]
    fn force_overrides_hardware_error() {
        // Scenario S1: a forced Real point with a faulted register.
        let mut point = Point::named(1, "P");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.data_type = DataType::Real;
        point.is_forced = true;
        point.forced_value = Some("42".to_string());
        let mut reg = analog_register(1, "0");
        reg.error_status = RegisterStatus::Fault;

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value.to_string(), "42");
        assert!(res.effects.is_empty(), "forcing must not alarm");
    }

    #[test]
    fn hardware_error_uses_faulty_value_and_alarms() {
        let mut point = Point::named(1, "P");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.may_be_faulty = true;
        point.faulty_value = -1.0;
        let mut reg = analog_register(1, "55");
        reg.error_status = RegisterStatus::CommError;

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value, PointValue::Float(-1.0));
        assert_eq!(
            res.effects[0],
            SideEffect::RaiseAlarm {
                name: "Hardware Error: COMM_ERROR".to_string(),
                description: "Register Fault".to_string(),
                severity: AlarmSeverity::High,
            }
        );
    }

    #[test]
    fn hardware_recovery_clears_alarms() {
        let mut point = Point::named(1, "P");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.read_value = Some("55".to_string());
        let reg = analog_register(1, "55");

        let res = resolve(&point, Some(&reg), no_data);
        assert!(res
            .effects
            .contains(&SideEffect::ClearAlarms { prefix: "Hardware Error:" }));
    }

    #[test]
    fn scaling_and_threshold_violation() {
        // Scenario S2: 4–20 mA scaled to 0–100 with a high limit of 80.
        let mut point = Point::named(1, "Temp");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.range_min = Some(4.0);
        point.range_max = Some(20.0);
        point.scale_min = Some(0.0);
        point.scale_max = Some(100.0);
        point.threshold_high = Some(80.0);
        point.threshold_low = Some(20.0);
        let reg = analog_register(1, "18");

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value.to_string(), "87.5");
        assert!(res.effects.iter().any(|e| matches!(
            e,
            SideEffect::RaiseAlarm { name, severity: AlarmSeverity::Critical, .. }
                if name == "Threshold Violation"
        )));
    }

    #[test]
    fn threshold_warning_inside_margin() {
        let mut point = Point::named(1, "Temp");
        point.threshold_high = Some(80.0);
        point.threshold_low = Some(20.0);
        point.read_value = Some("50".to_string());
        // margin = 6; 75 is within [74, 80).
        let mut p = point.clone();
        p.point_type = PointType::Variable;
        p.read_value = Some("75".to_string());

        let res = resolve(&p, None, no_data);
        assert!(res.effects.iter().any(|e| matches!(
            e,
            SideEffect::RaiseAlarm { name, severity: AlarmSeverity::Medium, .. }
                if name == "Threshold Warning"
        )));
    }

    #[test]
    fn degenerate_range_skips_scaling() {
        let mut point = Point::named(1, "P");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.range_min = Some(5.0);
        point.range_max = Some(5.0);
        point.scale_min = Some(0.0);
        point.scale_max = Some(100.0);
        point.gain = 2.0;
        let reg = analog_register(1, "21");

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value, PointValue::Float(42.0));
    }

    #[test]
    fn multistate_single_bit_extraction() {
        let mut point = Point::named(1, "Damper open");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.data_type = DataType::Boolean;
        point.is_single_bit = true;
        point.bit = 2;
        let mut reg = analog_register(1, "6"); // 0b110
        reg.signal_class = SignalClass::Multistate;

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value, PointValue::Bool(true));
    }

    #[test]
    fn missing_register_resolves_to_fallback() {
        let mut point = Point::named(1, "P");
        point.point_type = PointType::Register;
        point.register_id = Some(9);

        let res = resolve(&point, None, no_data);
        assert_eq!(res.value, PointValue::Float(0.0));
    }

    #[test]
    fn boolean_state_change_emits_event_and_log() {
        let mut point = Point::named(1, "Fan");
        point.point_type = PointType::Register;
        point.register_id = Some(1);
        point.data_type = DataType::Boolean;
        point.read_value = Some("false".to_string());
        let mut reg = analog_register(1, "1");
        reg.signal_class = SignalClass::Digital;

        let res = resolve(&point, Some(&reg), no_data);
        assert_eq!(res.value, PointValue::Bool(true));
        assert!(res.effects.iter().any(|e| matches!(
            e,
            SideEffect::AppendEvent { event_type: "STATE_CHANGE", description, .. }
                if description == "Fan is ON"
        )));
        assert!(res.effects.iter().any(|e| matches!(
            e,
            SideEffect::AppendLog { source: "State_Change", .. }
        )));

        // Same reading again: no further state-change event.
        point.read_value = Some("true".to_string());
        let res = resolve(&point, Some(&reg), no_data);
        assert!(!res
            .effects
            .iter()
            .any(|e| matches!(e, SideEffect::AppendEvent { .. })));
    }

    #[test]
    fn initial_encounter_appends_initial_log() {
        let mut point = Point::named(1, "New point");
        point.point_type = PointType::Variable;

        let res = resolve(&point, None, no_data);
        assert!(res.effects.iter().any(|e| matches!(
            e,
            SideEffect::AppendLog { source: "Initial_Log", .. }
        )));
    }

    #[test]
    fn data_point_runs_query_and_tolerates_garbage() {
        let mut point = Point::named(1, "Active alarms");
        point.point_type = PointType::Data;
        point.json_data = Some(r#"{"model": "alarms", "return": "count"}"#.to_string());
        let res = resolve(&point, None, |_q| 3.0);
        assert_eq!(res.value, PointValue::Float(3.0));

        point.json_data = Some("{broken".to_string());
        let res = resolve(&point, None, no_data);
        assert_eq!(res.value, PointValue::Float(0.0));
        assert!(!res
            .effects
            .iter()
            .any(|e| matches!(e, SideEffect::RaiseAlarm { .. })));
    }
}

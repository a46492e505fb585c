//! Raw-value coercion.
//!
//! Register values arrive from the field bus as text; forced values are
//! user-entered text. Every conversion here is total: a value that does not
//! parse becomes the type's fallback (false / 0.0), never an error.

use serde_json::Value;

/// Strings accepted as boolean true, compared case-insensitively.
const TRUE_WORDS: [&str; 4] = ["1", "true", "on", "yes"];

/// Coerce raw text to a boolean.
///
/// Null/empty is false. Numeric text is compared against 0.5 so that
/// analogue-sourced digitals ("0.97") behave sensibly. Otherwise the value
/// is true only if it is one of the accepted true-words.
pub fn to_bool(raw: Option<&str>) -> bool {
    let Some(s) = raw else { return false };
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    if let Ok(n) = s.parse::<f64>() {
        return n > 0.5;
    }
    TRUE_WORDS.iter().any(|w| s.eq_ignore_ascii_case(w))
}

/// Coerce raw text to a float. Null/empty and parse failures yield 0.0.
pub fn to_f64(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Coerce raw text to an integer: float-cast, then truncate toward zero.
pub fn to_i64(raw: Option<&str>) -> i64 {
    to_f64(raw) as i64
}

// ---------------------------------------------------------------------------
// JSON-value variants (FBD wires carry JSON values, not text)
// ---------------------------------------------------------------------------

/// Boolean view of a JSON value with the same fallback rules as [`to_bool`].
pub fn json_bool(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) > 0.5,
        Value::String(s) => to_bool(Some(s)),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Float view of a JSON value with the same fallback rules as [`to_f64`].
pub fn json_f64(v: &Value) -> f64 {
    match v {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => to_f64(Some(s)),
        Value::Array(_) | Value::Object(_) => 0.0,
    }
}

/// Render a JSON value as register-compatible text.
///
/// Floats print through Rust's shortest representation, so `7.0` becomes
/// `"7"` — the same convention the point processor uses for `read_value`.
pub fn json_to_text(v: &Value) -> String {
    match v {
        Value::Null => "0".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format!("{}", n.as_f64().unwrap_or(0.0)),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_accepts_true_words_case_insensitively() {
        for w in ["1", "true", "TRUE", "On", "yes", "YES"] {
            assert!(to_bool(Some(w)), "{w} should coerce true");
        }
        for w in ["0", "false", "off", "no", "maybe", ""] {
            assert!(!to_bool(Some(w)), "{w} should coerce false");
        }
        assert!(!to_bool(None));
    }

    #[test]
    fn bool_compares_numerics_against_half() {
        assert!(to_bool(Some("0.97")));
        assert!(!to_bool(Some("0.25")));
        assert!(to_bool(Some("3")));
        assert!(!to_bool(Some("-1")));
    }

    #[test]
    fn float_falls_back_to_zero() {
        assert_eq!(to_f64(Some("18")), 18.0);
        assert_eq!(to_f64(Some("  -3.5 ")), -3.5);
        assert_eq!(to_f64(Some("garbage")), 0.0);
        assert_eq!(to_f64(Some("")), 0.0);
        assert_eq!(to_f64(None), 0.0);
    }

    #[test]
    fn int_truncates_toward_zero() {
        assert_eq!(to_i64(Some("7.9")), 7);
        assert_eq!(to_i64(Some("-7.9")), -7);
        assert_eq!(to_i64(Some("bad")), 0);
    }

    #[test]
    fn json_views_follow_text_rules() {
        assert!(json_bool(&json!(true)));
        assert!(json_bool(&json!(0.75)));
        assert!(!json_bool(&json!(null)));
        assert!(json_bool(&json!("on")));
        assert_eq!(json_f64(&json!(2.5)), 2.5);
        assert_eq!(json_f64(&json!(true)), 1.0);
        assert_eq!(json_f64(&json!("oops")), 0.0);
    }

    #[test]
    fn text_rendering_uses_shortest_float_form() {
        assert_eq!(json_to_text(&json!(7.0)), "7");
        assert_eq!(json_to_text(&json!(87.5)), "87.5");
        assert_eq!(json_to_text(&json!(false)), "false");
        assert_eq!(json_to_text(&json!(null)), "0");
    }
}

//! The block catalogue.
//!
//! One closed dispatch: every block type is a match arm with its evaluation
//! rule, operating on JSON values with the standard coercions. Adding a
//! block means adding one arm. Arithmetic here never faults — zero divisors
//! and negative square roots collapse to 0 by contract.

use crate::coerce::{json_bool, json_f64};
use serde_json::{Map, Value, json};

/// Per-node evaluation context.
pub struct BlockCtx<'a> {
    /// The node's `params` object (constants carry `value` here).
    pub params: &'a Map<String, Value>,
    /// Current value of the bound point, for input blocks.
    pub bound_value: Option<Value>,
}

/// Raised for block types the catalogue does not know; the executor turns
/// this into a null-filled output vector.
#[derive(Debug)]
pub struct UnknownBlock(pub String);

/// Evaluate one block. The result is truncated or null-padded to
/// `outputs_count`, so every published vector has the declared width.
pub fn eval_block(
    block_type: &str,
    inputs: &[Value],
    outputs_count: usize,
    ctx: &BlockCtx<'_>,
) -> Result<Vec<Value>, UnknownBlock> {
    let f = |i: usize| inputs.get(i).map_or(0.0, json_f64);
    let b = |i: usize| inputs.get(i).is_some_and(|v| json_bool(v));
    let all_f = || inputs.iter().map(json_f64);
    let true_count = || inputs.iter().filter(|v| json_bool(v)).count();

    let values: Vec<Value> = match block_type {
        // ── Logic, n-ary ──────────────────────────────────────
        "AND" => vec![json!(!inputs.is_empty() && inputs.iter().all(json_bool))],
        "OR" => vec![json!(inputs.iter().any(json_bool))],
        "NAND" => vec![json!(!(!inputs.is_empty() && inputs.iter().all(json_bool)))],
        "NOR" => vec![json!(!inputs.iter().any(json_bool))],
        "XOR" => vec![json!(true_count() % 2 == 1)],
        "XNOR" => vec![json!(true_count() % 2 == 0)],
        "NOT" => vec![json!(!b(0))],

        // ── Arithmetic ────────────────────────────────────────
        "ADD" => vec![json!(all_f().sum::<f64>())],
        "SUB" => vec![json!(f(0) - all_f().skip(1).sum::<f64>())],
        "MUL" => {
            let product = if inputs.is_empty() { 0.0 } else { all_f().product::<f64>() };
            vec![json!(product)]
        }
        "DIV" => {
            let mut acc = f(0);
            for i in 1..inputs.len() {
                let d = f(i);
                if d == 0.0 {
                    acc = 0.0;
                    break;
                }
                acc /= d;
            }
            vec![json!(acc)]
        }
        "MOD" => {
            let (a, m) = (f(0), f(1));
            vec![json!(if m == 0.0 { 0.0 } else { a % m })]
        }
        "ABS" => vec![json!(f(0).abs())],
        "NEG" => vec![json!(-f(0))],
        "SQRT" => {
            let v = f(0);
            vec![json!(if v < 0.0 { 0.0 } else { v.sqrt() })]
        }
        "POW" => vec![json!(f(0).powf(f(1)))],

        // ── Comparison (first two inputs) ─────────────────────
        "EQ" => vec![json!(f(0) == f(1))],
        "NE" => vec![json!(f(0) != f(1))],
        "GT" => vec![json!(f(0) > f(1))],
        "GE" => vec![json!(f(0) >= f(1))],
        "LT" => vec![json!(f(0) < f(1))],
        "LE" => vec![json!(f(0) <= f(1))],

        // ── Selection ─────────────────────────────────────────
        "SEL" => vec![json!(if b(0) { f(2) } else { f(1) })],
        "MAX" => vec![json!(
            all_f().fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v)))).unwrap_or(0.0)
        )],
        "MIN" => vec![json!(
            all_f().fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v)))).unwrap_or(0.0)
        )],
        "LIMIT" => {
            let (lo, v, hi) = (f(0), f(1), f(2));
            vec![json!(f64::max(lo, f64::min(v, hi)))]
        }

        // ── I/O ───────────────────────────────────────────────
        "DIGITAL_IN" => {
            vec![json!(ctx.bound_value.as_ref().is_some_and(json_bool))]
        }
        "ANALOG_IN" => {
            vec![json!(ctx.bound_value.as_ref().map_or(0.0, json_f64))]
        }
        // The write itself happens in the executor; the block publishes
        // the value it forwarded.
        "DIGITAL_OUT" => vec![json!(b(0))],
        "ANALOG_OUT" => vec![json!(f(0))],

        // ── Constants ─────────────────────────────────────────
        "CONST_DIG" => {
            vec![json!(ctx.params.get("value").is_some_and(json_bool))]
        }
        "CONST_ANA" => {
            vec![json!(ctx.params.get("value").map_or(0.0, json_f64))]
        }

        // ── Multiplexing ──────────────────────────────────────
        "MUX" => {
            if inputs.len() < 2 {
                vec![Value::Null]
            } else {
                let data = &inputs[..inputs.len() - 1];
                let sel = f(inputs.len() - 1) as i64;
                let picked = usize::try_from(sel)
                    .ok()
                    .and_then(|i| data.get(i))
                    .cloned()
                    .unwrap_or(Value::Null);
                vec![picked]
            }
        }
        "DEMUX" => {
            let value = inputs.first().cloned().unwrap_or(Value::Null);
            let sel = f(1) as i64;
            let mut out = vec![Value::Null; outputs_count];
            if let Ok(i) = usize::try_from(sel) {
                if i < out.len() {
                    out[i] = value;
                }
            }
            out
        }

        // ── Coding ────────────────────────────────────────────
        "ENCODER" => {
            let idx = inputs.iter().position(json_bool).unwrap_or(0);
            vec![json!(idx)]
        }
        "DECODER" => {
            let sel = f(0) as i64;
            let mut out = vec![json!(false); outputs_count];
            if let Ok(i) = usize::try_from(sel) {
                if i < out.len() {
                    out[i] = json!(true);
                }
            }
            out
        }
        "BIN_TO_DIG" => {
            let n = f(0) as i64;
            (0..outputs_count).map(|i| json!((n >> i) & 1 == 1)).collect()
        }
        "DIG_TO_BIN" => {
            let n: i64 = (0..inputs.len()).map(|i| i64::from(b(i)) << i).sum();
            vec![json!(n)]
        }

        // ── Utility ───────────────────────────────────────────
        "SPLITTER" => {
            let v = inputs.first().cloned().unwrap_or(Value::Null);
            vec![v; outputs_count]
        }
        "ANA_DISP" => vec![json!(f(0))],
        "DIG_DISP" => vec![json!(b(0))],

        other => return Err(UnknownBlock(other.to_string())),
    };

    Ok(normalise(values, outputs_count))
}

/// Truncate or null-pad to the declared output width.
fn normalise(mut values: Vec<Value>, outputs_count: usize) -> Vec<Value> {
    values.truncate(outputs_count);
    while values.len() < outputs_count {
        values.push(Value::Null);
    }
    values
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_empty() -> (Map<String, Value>, Option<Value>) {
        (Map::new(), None)
    }

    fn eval(block: &str, inputs: &[Value], outputs: usize) -> Vec<Value> {
        let (params, bound_value) = ctx_empty();
        eval_block(block, inputs, outputs, &BlockCtx { params: &params, bound_value })
            .expect("known block")
    }

    #[test]
    fn nary_gates_reduce_all_inputs() {
        let t = json!(true);
        let f = json!(false);
        assert_eq!(eval("AND", &[t.clone(), t.clone(), f.clone()], 1), vec![json!(false)]);
        assert_eq!(eval("AND", &[t.clone(), t.clone()], 1), vec![json!(true)]);
        assert_eq!(eval("OR", &[f.clone(), f.clone(), t.clone()], 1), vec![json!(true)]);
        // Empty-input conventions.
        assert_eq!(eval("AND", &[], 1), vec![json!(false)]);
        assert_eq!(eval("OR", &[], 1), vec![json!(false)]);
        assert_eq!(eval("NAND", &[], 1), vec![json!(true)]);
        assert_eq!(eval("NOR", &[], 1), vec![json!(true)]);
    }

    #[test]
    fn xor_counts_parity() {
        let t = json!(true);
        let f = json!(false);
        // Two trues → even → XOR false (scenario S3's three-input gate).
        assert_eq!(eval("XOR", &[t.clone(), t.clone(), f.clone()], 1), vec![json!(false)]);
        assert_eq!(eval("XOR", &[t.clone(), f.clone(), f.clone()], 1), vec![json!(true)]);
        assert_eq!(eval("XNOR", &[t.clone(), t.clone(), f], 1), vec![json!(true)]);
    }

    #[test]
    fn not_defaults_true_on_missing_input() {
        assert_eq!(eval("NOT", &[], 1), vec![json!(true)]);
        assert_eq!(eval("NOT", &[json!(true)], 1), vec![json!(false)]);
    }

    #[test]
    fn arithmetic_guards() {
        assert_eq!(eval("ADD", &[json!(1.5), json!(2.5), json!(3.0)], 1), vec![json!(7.0)]);
        assert_eq!(eval("SUB", &[json!(10), json!(3), json!(2)], 1), vec![json!(5.0)]);
        assert_eq!(eval("DIV", &[json!(8), json!(2), json!(2)], 1), vec![json!(2.0)]);
        assert_eq!(eval("DIV", &[json!(8), json!(0)], 1), vec![json!(0.0)]);
        assert_eq!(eval("MOD", &[json!(7), json!(0)], 1), vec![json!(0.0)]);
        assert_eq!(eval("SQRT", &[json!(-4)], 1), vec![json!(0.0)]);
        assert_eq!(eval("POW", &[json!(2), json!(10)], 1), vec![json!(1024.0)]);
    }

    #[test]
    fn selection_blocks() {
        // SEL(g, a, b) = b if g else a.
        assert_eq!(eval("SEL", &[json!(true), json!(1), json!(2)], 1), vec![json!(2.0)]);
        assert_eq!(eval("SEL", &[json!(false), json!(1), json!(2)], 1), vec![json!(1.0)]);
        assert_eq!(eval("MAX", &[json!(3), json!(9), json!(5)], 1), vec![json!(9.0)]);
        assert_eq!(eval("MIN", &[json!(3), json!(9), json!(5)], 1), vec![json!(3.0)]);
        assert_eq!(eval("LIMIT", &[json!(0), json!(150), json!(100)], 1), vec![json!(100.0)]);
        assert_eq!(eval("LIMIT", &[json!(0), json!(-5), json!(100)], 1), vec![json!(0.0)]);
    }

    #[test]
    fn mux_demux_and_coding() {
        // MUX: last input selects among the preceding data inputs.
        assert_eq!(
            eval("MUX", &[json!(10), json!(20), json!(30), json!(1)], 1),
            vec![json!(20)]
        );
        assert_eq!(eval("MUX", &[json!(10), json!(20), json!(7)], 1), vec![Value::Null]);
        // DEMUX: (value, selector) → one-hot vector.
        assert_eq!(
            eval("DEMUX", &[json!(42), json!(2)], 4),
            vec![Value::Null, Value::Null, json!(42), Value::Null]
        );
        assert_eq!(eval("ENCODER", &[json!(false), json!(false), json!(true)], 1), vec![json!(2)]);
        assert_eq!(
            eval("DECODER", &[json!(1)], 3),
            vec![json!(false), json!(true), json!(false)]
        );
        assert_eq!(
            eval("BIN_TO_DIG", &[json!(6)], 4),
            vec![json!(false), json!(true), json!(true), json!(false)]
        );
        assert_eq!(
            eval("DIG_TO_BIN", &[json!(false), json!(true), json!(true)], 1),
            vec![json!(6)]
        );
    }

    #[test]
    fn splitter_fans_out_and_width_is_enforced() {
        assert_eq!(eval("SPLITTER", &[json!(5)], 3), vec![json!(5), json!(5), json!(5)]);
        // A one-output block asked for three ports gets null padding.
        assert_eq!(eval("ADD", &[json!(1)], 3), vec![json!(1.0), Value::Null, Value::Null]);
    }

    #[test]
    fn constants_and_displays() {
        let mut params = Map::new();
        params.insert("value".to_string(), json!(true));
        let out = eval_block("CONST_DIG", &[], 1, &BlockCtx { params: &params, bound_value: None })
            .unwrap();
        assert_eq!(out, vec![json!(true)]);

        let mut params = Map::new();
        params.insert("value".to_string(), json!(21.5));
        let out = eval_block("CONST_ANA", &[], 1, &BlockCtx { params: &params, bound_value: None })
            .unwrap();
        assert_eq!(out, vec![json!(21.5)]);

        assert_eq!(eval("ANA_DISP", &[json!(3.5)], 1), vec![json!(3.5)]);
        assert_eq!(eval("DIG_DISP", &[json!(1)], 1), vec![json!(true)]);
    }

    #[test]
    fn io_blocks_read_bindings_and_forward_writes() {
        let params = Map::new();
        let out = eval_block(
            "ANALOG_IN",
            &[],
            1,
            &BlockCtx { params: &params, bound_value: Some(json!("21.5")) },
        )
        .unwrap();
        assert_eq!(out, vec![json!(21.5)]);

        let out = eval_block(
            "DIGITAL_IN",
            &[],
            1,
            &BlockCtx { params: &params, bound_value: None },
        )
        .unwrap();
        assert_eq!(out, vec![json!(false)]);

        assert_eq!(eval("DIGITAL_OUT", &[json!(0.9)], 1), vec![json!(true)]);
        assert_eq!(eval("ANALOG_OUT", &[json!("7")], 1), vec![json!(7.0)]);
    }

    #[test]
    fn unknown_blocks_are_rejected() {
        let params = Map::new();
        assert!(
            eval_block("FLUX_CAP", &[], 2, &BlockCtx { params: &params, bound_value: None })
                .is_err()
        );
    }
}

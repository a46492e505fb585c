//! The sandboxed evaluator.
//!
//! Built from a raw engine so the symbol surface is exactly what we
//! register: arithmetic, comparison/logic, the basic math functions, and
//! the `min`/`max`/`round`/`abs` helpers scripts lean on. There is no
//! `print`, no `eval`, no file or network access, and no reflection — an
//! unregistered identifier fails with a function-not-found error that the
//! executor surfaces in the execution log. An operation budget bounds
//! runaway loops.

use rhai::Engine;
use rhai::packages::{ArithmeticPackage, BasicMathPackage, LogicPackage, Package};

/// Assemble the restricted engine. `max_operations` caps the number of
/// evaluator steps a single run may take (0 disables the cap).
pub fn build_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new_raw();

    ArithmeticPackage::new().register_into_engine(&mut engine);
    LogicPackage::new().register_into_engine(&mut engine);
    BasicMathPackage::new().register_into_engine(&mut engine);

    engine.set_max_operations(max_operations);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(16);

    // Scripts mix float variables with integer literals freely, so the
    // helpers carry the mixed overloads too.
    engine
        .register_fn("min", |a: f64, b: f64| a.min(b))
        .register_fn("min", |a: i64, b: i64| a.min(b))
        .register_fn("min", |a: f64, b: i64| a.min(b as f64))
        .register_fn("min", |a: i64, b: f64| (a as f64).min(b))
        .register_fn("max", |a: f64, b: f64| a.max(b))
        .register_fn("max", |a: i64, b: i64| a.max(b))
        .register_fn("max", |a: f64, b: i64| a.max(b as f64))
        .register_fn("max", |a: i64, b: f64| (a as f64).max(b))
        .register_fn("round", |v: f64| v.round())
        .register_fn("round", |v: f64, places: i64| {
            let k = 10f64.powi(places as i32);
            (v * k).round() / k
        })
        .register_fn("round", |v: i64| v)
        .register_fn("abs", |v: f64| v.abs())
        .register_fn("abs", |v: i64| v.abs());

    engine
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

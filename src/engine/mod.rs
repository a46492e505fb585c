//! The scheduler — the deterministic heart of the runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       One cycle                             │
//! │                                                             │
//! │  P1  Points refresh   resolve every active point,           │
//! │      │                buffer alarms/events/logs,            │
//! │      ▼                bulk-persist changed read_values      │
//! │  P2  FBD cycle        run every active diagram against      │
//! │      │                the post-P1 snapshot                  │
//! │      ▼                                                      │
//! │  P3  Scripts cycle    run every active script, write        │
//! │                       declared outputs                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Phase ordering is strict: P1 completes before P2 reads any point, P2
//! before P3, so programs always see a consistent per-cycle snapshot. The
//! engine is the **only** writer to runtime fields; manual one-shot
//! executions from the control surface serialise with the loop through the
//! engine mutex. A stop flag is honoured at phase boundaries, so shutdown
//! never tears a bulk write in half.

mod telemetry;

pub use telemetry::{CycleStats, TelemetrySink};

use crate::coerce::json_to_text;
use crate::config::EngineConfig;
use crate::error::{Error, StoreError};
use crate::fbd::{FbdExecutor, flatten_values};
use crate::points::{self, SideEffect};
use crate::script::{ScriptExecutor, Validation};
use crate::store::ConfigStore;
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct Engine {
    store: Box<dyn ConfigStore>,
    config: EngineConfig,
    scripts: ScriptExecutor,
    stats: CycleStats,
    telemetry: TelemetrySink,
}

impl Engine {
    pub fn new(store: Box<dyn ConfigStore>, config: EngineConfig) -> Self {
        let scripts = ScriptExecutor::new(config.script_max_operations);
        let telemetry = TelemetrySink::open(config.telemetry_log_path.as_deref());
        Self { store, config, scripts, stats: CycleStats::default(), telemetry }
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ConfigStore {
        self.store.as_mut()
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    // ── One cycle ─────────────────────────────────────────────

    /// Run P1 → P2 → P3 once. `stop` is checked between phases; a raised
    /// flag finishes the current phase and skips the rest of the cycle.
    pub fn cycle(&mut self, stop: &AtomicBool) {
        let t = Instant::now();
        let p_count = self.refresh_points();
        let p1 = t.elapsed();

        if stop.load(Ordering::Relaxed) {
            return;
        }
        let t = Instant::now();
        let f_count = self.run_fbd_programs();
        let p2 = t.elapsed();

        if stop.load(Ordering::Relaxed) {
            return;
        }
        let t = Instant::now();
        let s_count = self.run_scripts();
        let p3 = t.elapsed();

        self.stats.record_cycle(p_count, p1, f_count, p2, s_count, p3);
        if self.stats.cycles % self.config.telemetry_every_cycles.max(1) == 0 {
            self.telemetry.emit(&self.stats);
        }
    }

    // ── P1: points ────────────────────────────────────────────

    /// Resolve every active point, apply buffered side effects in point-id
    /// order, and bulk-persist the changed `read_value`s.
    fn refresh_points(&mut self) -> usize {
        let snapshot = self.store.active_points();
        let mut updates: Vec<(i64, String)> = Vec::new();
        let mut buffered: Vec<(i64, Vec<SideEffect>)> = Vec::new();

        for point in &snapshot {
            let register = point.register_id.and_then(|id| self.store.register(id));
            let resolution =
                points::resolve(point, register.as_ref(), |q| self.store.data_query(q));
            let text = resolution.value.to_string();
            if point.read_value.as_deref() != Some(text.as_str()) {
                updates.push((point.id, text));
            }
            if !resolution.effects.is_empty() {
                buffered.push((point.id, resolution.effects));
            }
        }

        // Side effects land in ascending point-id order (the snapshot is
        // already sorted), sources in their semantic order per point.
        for (point_id, effects) in buffered {
            for effect in effects {
                self.apply_side_effect(point_id, effect);
            }
        }

        if !updates.is_empty() {
            self.persist("points", |store| store.bulk_update_read_values(&updates));
        }
        snapshot.len()
    }

    fn apply_side_effect(&mut self, point_id: i64, effect: SideEffect) {
        match effect {
            SideEffect::RaiseAlarm { name, description, severity } => {
                self.store.raise_alarm(Some(point_id), &name, &description, severity);
            }
            SideEffect::ClearAlarms { prefix } => {
                self.store.close_alarms_with_prefix(point_id, prefix);
            }
            SideEffect::AppendEvent { event_type, description, severity } => {
                self.store.append_event(Some(point_id), event_type, &description, severity);
            }
            SideEffect::AppendLog { source, value, message } => {
                self.store.append_log(Some(point_id), source, &value, &message);
            }
        }
    }

    // ── P2: FBD programs ──────────────────────────────────────

    fn run_fbd_programs(&mut self) -> usize {
        let programs = self.store.active_fbd_programs();
        let point_values = self.point_value_snapshot();
        let count = programs.len();

        for program in programs {
            match self.run_one_fbd(&program, &point_values, true) {
                Ok(_) => {}
                Err(e) => {
                    warn!("fbd {}: skipped ({e})", program.name);
                    self.stats.program_errors += 1;
                }
            }
        }
        count
    }

    /// Current value of every point, keyed by id, for I/O blocks.
    fn point_value_snapshot(&self) -> HashMap<i64, Value> {
        self.store
            .points()
            .into_iter()
            .filter_map(|p| p.read_value.map(|v| (p.id, Value::String(v))))
            .collect()
    }

    /// Evaluate one program and persist what changed. Returns the
    /// flattened runtime values.
    fn run_one_fbd(
        &mut self,
        program: &crate::model::FbdProgram,
        point_values: &HashMap<i64, Value>,
        only_if_changed: bool,
    ) -> Result<Map<String, Value>, Error> {
        let executor = FbdExecutor::new(program)?;
        let outcome = executor.execute_cycle(|id| point_values.get(&id).cloned());
        if outcome.cyclic {
            self.stats.cyclic_programs += 1;
        }

        for (point_id, value) in &outcome.writes {
            let text = json_to_text(value);
            self.persist("fbd write", |store| store.set_point_write_value(*point_id, &text));
        }

        let flat = flatten_values(&outcome.node_values);
        if !only_if_changed || flat != program.runtime_values {
            let id = program.id;
            let state = program.runtime_state.clone();
            let values = flat.clone();
            self.persist("fbd runtime", move |store| {
                store.update_fbd_runtime(id, values.clone(), state.clone())
            });
        }
        Ok(flat)
    }

    // ── P3: scripts ───────────────────────────────────────────

    fn run_scripts(&mut self) -> usize {
        let scripts = self.store.active_script_programs();
        let count = scripts.len();
        for script in scripts {
            self.run_one_script(&script);
        }
        count
    }

    fn run_one_script(&mut self, script: &crate::model::ScriptProgram) -> (String, String) {
        let bindings = self.store.script_bindings(script.id);
        let store = &self.store;
        let outcome = self.scripts.execute(&script.code_text, &bindings, |id| {
            store.point(id).and_then(|p| p.read_value)
        });

        for (point_id, text) in &outcome.outputs {
            self.persist("script write", |s| s.set_point_write_value(*point_id, text));
        }
        let status = outcome.status.as_str().to_string();
        let id = script.id;
        let log = outcome.log.clone();
        self.persist("script status", move |s| {
            s.update_script_execution(id, &status, &log)
        });
        (outcome.status.as_str().to_string(), outcome.log)
    }

    // ── Manual triggers (control surface) ─────────────────────

    /// One-shot FBD evaluation with in-cycle semantics. Serialises with
    /// the loop because the caller holds the engine mutex.
    pub fn execute_fbd_once(&mut self, program_id: i64) -> Result<Map<String, Value>, Error> {
        let program = self
            .store
            .fbd_program(program_id)
            .ok_or(StoreError::NotFound("fbd program", program_id))?;
        let point_values = self.point_value_snapshot();
        self.run_one_fbd(&program, &point_values, false)
    }

    /// One-shot script execution. Returns (status, log).
    pub fn execute_script_once(&mut self, script_id: i64) -> Result<(String, String), Error> {
        let script = self
            .store
            .script_program(script_id)
            .ok_or(StoreError::NotFound("script program", script_id))?;
        Ok(self.run_one_script(&script))
    }

    /// Compile a stored script and record the outcome in its log.
    pub fn validate_script(&mut self, script_id: i64) -> Result<Validation, Error> {
        let script = self
            .store
            .script_program(script_id)
            .ok_or(StoreError::NotFound("script program", script_id))?;
        let validation = self.scripts.validate(&script.code_text);
        let log = match validation.status {
            crate::script::ValidationStatus::Valid => {
                "[Validation] Success: Script is valid.".to_string()
            }
            crate::script::ValidationStatus::Invalid => format!(
                "[Validation] Syntax Error: {}",
                validation.error.as_deref().unwrap_or("unknown")
            ),
        };
        self.persist("validation log", |s| s.update_script_log(script_id, &log));
        Ok(validation)
    }

    // ── Persistence with one retry ────────────────────────────

    /// Infrastructure failures get one retry inside the phase; a second
    /// failure drops the write and is counted, never escalated.
    fn persist(&mut self, what: &str, op: impl Fn(&mut dyn ConfigStore) -> Result<(), StoreError>) {
        if let Err(first) = op(self.store.as_mut()) {
            warn!("{what}: persistence failed ({first}), retrying once");
            if let Err(second) = op(self.store.as_mut()) {
                error!("{what}: persistence failed twice ({second}); write dropped");
                self.stats.persist_failures += 1;
            }
        }
    }

    /// Write the snapshot out (shutdown path).
    pub fn flush(&mut self) {
        if let Err(e) = self.store.flush() {
            error!("final snapshot flush failed: {e}");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// The loop
// ───────────────────────────────────────────────────────────────

/// Drive the engine at its configured cadence until `stop` is raised.
/// Overrunning cycles start the next one after the minimum sleep; there is
/// no back-pressure.
pub fn run_loop(engine: &Mutex<Engine>, stop: &AtomicBool) {
    let (interval, min_sleep) = {
        let guard = lock(engine);
        (
            Duration::from_millis(guard.config.cycle_interval_ms),
            Duration::from_millis(guard.config.min_sleep_ms),
        )
    };
    info!("engine loop started (cycle {} ms)", interval.as_millis());

    while !stop.load(Ordering::Relaxed) {
        let started = Instant::now();
        lock(engine).cycle(stop);
        let elapsed = started.elapsed();
        let sleep = interval.saturating_sub(elapsed).max(min_sleep);
        std::thread::sleep(sleep);
    }

    lock(engine).flush();
    info!("engine loop stopped");
}

fn lock<'a>(engine: &'a Mutex<Engine>) -> std::sync::MutexGuard<'a, Engine> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

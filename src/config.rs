//! Engine configuration parameters.
//!
//! All tunables for the runtime loop. Defaults suit a standard deployment;
//! individual values can be overridden through `VANTAGE_*` environment
//! variables at boot.

use serde::{Deserialize, Serialize};

/// Core engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Timing ---
    /// Target scheduler cycle (milliseconds).
    pub cycle_interval_ms: u64,
    /// Floor for the inter-cycle sleep, even when a cycle overruns.
    pub min_sleep_ms: u64,
    /// Emit a telemetry line every N cycles (~once per second).
    pub telemetry_every_cycles: u64,

    // --- Scripts ---
    /// Evaluator operation budget per script run (0 = unbounded).
    pub script_max_operations: u64,

    // --- Surfaces ---
    /// Listen address for the HTTP control surface.
    pub http_addr: String,
    /// Optional file the telemetry lines are appended to.
    pub telemetry_log_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Timing
            cycle_interval_ms: 100, // 10 Hz
            min_sleep_ms: 10,
            telemetry_every_cycles: 10, // ~1/s at the default cycle

            // Scripts
            script_max_operations: 200_000,

            // Surfaces
            http_addr: "127.0.0.1:8600".to_string(),
            telemetry_log_path: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `VANTAGE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse("VANTAGE_CYCLE_MS") {
            config.cycle_interval_ms = ms;
        }
        if let Some(ops) = env_parse("VANTAGE_SCRIPT_MAX_OPS") {
            config.script_max_operations = ops;
        }
        if let Ok(addr) = std::env::var("VANTAGE_HTTP_ADDR") {
            if !addr.is_empty() {
                config.http_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("VANTAGE_TELEMETRY_LOG") {
            if !path.is_empty() {
                config.telemetry_log_path = Some(path);
            }
        }
        config
    }
}

fn env_parse(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

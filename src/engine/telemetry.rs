//! Cycle counters and the telemetry line.
//!
//! The scheduler records per-phase wall-clock times and entity counts each
//! cycle; roughly once per second the sink formats one line, logs it, and
//! appends it to the optional telemetry file.

use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::Duration;

/// Rolling counters the loop maintains. All monotonic except the
/// last-cycle phase figures.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub cycles: u64,
    /// Persistence attempts that failed twice and were dropped.
    pub persist_failures: u64,
    /// Programs skipped because they failed to decode or evaluate.
    pub program_errors: u64,
    /// Cyclic diagrams encountered (best-effort passes).
    pub cyclic_programs: u64,

    // Last-cycle figures.
    pub last_point_count: usize,
    pub last_fbd_count: usize,
    pub last_script_count: usize,
    pub last_p1: Duration,
    pub last_p2: Duration,
    pub last_p3: Duration,
}

impl CycleStats {
    pub fn record_cycle(
        &mut self,
        points: usize,
        p1: Duration,
        fbds: usize,
        p2: Duration,
        scripts: usize,
        p3: Duration,
    ) {
        self.cycles += 1;
        self.last_point_count = points;
        self.last_fbd_count = fbds;
        self.last_script_count = scripts;
        self.last_p1 = p1;
        self.last_p2 = p2;
        self.last_p3 = p3;
    }

    fn line(&self) -> String {
        format!(
            "cycle {}: P:{}({:.3}s) F:{}({:.3}s) S:{}({:.3}s) drops:{} errors:{}",
            self.cycles,
            self.last_point_count,
            self.last_p1.as_secs_f64(),
            self.last_fbd_count,
            self.last_p2.as_secs_f64(),
            self.last_script_count,
            self.last_p3.as_secs_f64(),
            self.persist_failures,
            self.program_errors,
        )
    }
}

/// Where telemetry lines go: always the log, optionally a file.
pub struct TelemetrySink {
    file: Option<File>,
}

impl TelemetrySink {
    pub fn open(path: Option<&str>) -> Self {
        let file = path.and_then(|p| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(p)
                .map_err(|e| warn!("telemetry log {p} unavailable: {e}"))
                .ok()
        });
        Self { file }
    }

    pub fn emit(&mut self, stats: &CycleStats) {
        let line = stats.line();
        info!("{line}");
        if let Some(file) = &mut self.file {
            if let Err(e) = writeln!(file, "{line}") {
                warn!("telemetry append failed: {e}");
                self.file = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_reports_counts_and_phase_times() {
        let mut stats = CycleStats::default();
        stats.record_cycle(
            12,
            Duration::from_millis(3),
            2,
            Duration::from_millis(1),
            1,
            Duration::from_millis(2),
        );
        let line = stats.line();
        assert!(line.starts_with("cycle 1:"));
        assert!(line.contains("P:12(0.003s)"));
        assert!(line.contains("F:2(0.001s)"));
        assert!(line.contains("S:1(0.002s)"));
    }
}

//! Vantage engine — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  MemStore          axum router        ctrlc handler          │
//! │  (ConfigStore)     (control surface)  (stop flag)            │
//! │                                                              │
//! │  ──────────────── trait / mutex boundary ────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        Engine (pure logic behind one mutex)            │  │
//! │  │  P1 points · P2 diagrams · P3 scripts                  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler loop runs on a dedicated thread; the HTTP surface runs on
//! a tokio runtime in the main thread. Both drain on the same stop flag.

use anyhow::{Context, Result, bail};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use vantage::config::EngineConfig;
use vantage::control;
use vantage::engine::{Engine, run_loop};
use vantage::store::MemStore;

fn main() -> Result<()> {
    env_logger::init();

    info!("Vantage engine v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration and store ────────────────────────────
    let config = EngineConfig::from_env();
    let Ok(dsn) = std::env::var("VANTAGE_DSN") else {
        bail!("VANTAGE_DSN is not set (use `mem:` or a snapshot path)");
    };
    let store = MemStore::open(&dsn).with_context(|| format!("opening store at {dsn}"))?;

    // ── 2. Engine behind the runtime-field mutex ──────────────
    let engine: control::SharedEngine =
        Arc::new(Mutex::new(Engine::new(Box::new(store), config.clone())));

    // ── 3. Stop flag wired to Ctrl-C ──────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            stop.store(true, Ordering::Relaxed);
        })
        .context("installing signal handler")?;
    }

    // ── 4. Scheduler thread ───────────────────────────────────
    let loop_engine = engine.clone();
    let loop_stop = stop.clone();
    let scheduler = std::thread::Builder::new()
        .name("engine-loop".to_string())
        .spawn(move || run_loop(&loop_engine, &loop_stop))
        .context("spawning engine loop")?;

    // ── 5. HTTP control surface (blocks until stop) ───────────
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime
        .block_on(control::http::serve(engine, &config.http_addr, stop))
        .context("control surface failed")?;

    scheduler
        .join()
        .map_err(|_| anyhow::anyhow!("engine loop panicked"))?;
    info!("clean shutdown");
    Ok(())
}

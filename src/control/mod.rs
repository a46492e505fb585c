//! HTTP control surface.
//!
//! Follows the transport-decoupled split used by the RPC layer this engine
//! grew out of: [`api`] dispatches requests against the shared engine and
//! speaks plain JSON values, [`http`] is the thin axum adapter that binds
//! those operations to routes. Manual executions serialise with the
//! scheduler loop through the engine mutex, so the runtime fields only ever
//! have one writer at a time.

pub mod api;
pub mod http;

use crate::engine::Engine;
use std::sync::{Arc, Mutex};

/// The engine as shared with the HTTP adapter and the scheduler thread.
pub type SharedEngine = Arc<Mutex<Engine>>;

fn lock(engine: &SharedEngine) -> std::sync::MutexGuard<'_, Engine> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

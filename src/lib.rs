//! Vantage runtime engine library.
//!
//! Exposes the engine core for integration testing and embedding. The
//! binary in `main.rs` wires the scheduler loop to the snapshot store and
//! the HTTP control surface; everything here is host-testable with an
//! in-memory store.

#![deny(unused_must_use)]

pub mod coerce;
pub mod config;
pub mod control;
pub mod engine;
pub mod fbd;
pub mod model;
pub mod points;
pub mod script;
pub mod store;

mod error;

pub use error::{DiagramError, Error, Result, ScriptError, StoreError};

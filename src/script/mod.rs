//! Script programs — a declaration header plus a sandboxed body.
//!
//! The header declares the program's I/O surface in four words
//! (`digital_input`, `digital_output`, `analogue_input`,
//! `analogue_output`); the body is an expression-level program run in a
//! stripped-down evaluator with no file, network, or reflection surface.
//! Declared variables are the only channel in or out.

mod executor;
mod header;
mod sandbox;

pub use executor::{ExecOutcome, ExecStatus, ScriptExecutor, Validation, ValidationStatus};
pub use header::{DeclKind, Declaration, ParsedScript, parse_header};
pub use sandbox::build_engine;

//! Unified error types for the Vantage engine.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! scheduler loop's error handling uniform. Value coercion is deliberately
//! absent: coercion is total and substitutes fallbacks instead of failing.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level engine error
// ---------------------------------------------------------------------------

/// Every fallible operation in the engine funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration store rejected an operation.
    Store(StoreError),
    /// A program diagram could not be decoded.
    Diagram(DiagramError),
    /// A script failed to parse or run.
    Script(ScriptError),
    /// Engine startup failed (bad DSN, unreachable store).
    Init(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Diagram(e) => write!(f, "diagram: {e}"),
            Self::Script(e) => write!(f, "script: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested entity does not exist.
    NotFound(&'static str, i64),
    /// The snapshot file could not be read or written.
    Snapshot(String),
    /// The snapshot decoded but failed an integrity check.
    Corrupted(String),
    /// The DSN scheme is not one the store understands.
    BadDsn(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(kind, id) => write!(f, "{kind} {id} not found"),
            Self::Snapshot(msg) => write!(f, "snapshot I/O: {msg}"),
            Self::Corrupted(msg) => write!(f, "snapshot corrupted: {msg}"),
            Self::BadDsn(dsn) => write!(f, "unrecognised DSN: {dsn}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Diagram errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramError {
    /// `diagram_json` is neither an object nor a JSON string encoding one.
    Malformed(String),
}

impl fmt::Display for DiagramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed diagram: {msg}"),
        }
    }
}

impl std::error::Error for DiagramError {}

impl From<DiagramError> for Error {
    fn from(e: DiagramError) -> Self {
        Self::Diagram(e)
    }
}

// ---------------------------------------------------------------------------
// Script errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The body failed to compile. `line` is 1-based when known.
    Parse { message: String, line: Option<usize> },
    /// The body compiled but the evaluator raised an error.
    Eval { message: String },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { message, line: Some(n) } => {
                write!(f, "parse error at line {n}: {message}")
            }
            Self::Parse { message, line: None } => write!(f, "parse error: {message}"),
            Self::Eval { message } => write!(f, "eval error: {message}"),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<ScriptError> for Error {
    fn from(e: ScriptError) -> Self {
        Self::Script(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

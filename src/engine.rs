//! Engine seam for the bridge.
//!
//! The command loop talks to the MATLAB engine through the `Engine` trait.
//! This trait abstracts the engine to enable:
//! - Dependency injection for testing with scripted implementations
//! - Separation of interface from implementation
//! - Testing the session protocol without a MATLAB installation
//!
//! The production implementation is [`MatlabEngine`], which drives the
//! engine's Python binding (`matlab.engine`) through PyO3.

mod matlab;

use std::path::Path;

use thiserror::Error;

pub use matlab::MatlabEngine;

/// Fatal engine lifecycle errors.
///
/// The `Display` strings are the exact texts reported to the parent in the
/// terminal `{"error": ...}` line, so variants double as the wire format.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's Python binding is not importable. Non-retryable; the
    /// bridge cannot function without it.
    #[error(
        "matlab.engine not found. Install with: cd <MATLAB>/extern/engines/python && python setup.py install"
    )]
    BindingMissing,

    /// The engine process could not be started.
    #[error("Failed to start MATLAB engine: {0}")]
    StartFailed(String),

    /// Best-effort shutdown failed. Callers swallow this.
    #[error("Engine shutdown failed: {0}")]
    ShutdownFailed(String),
}

/// Output captured from one engine evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalCapture {
    /// Everything the engine wrote to its standard-output analog.
    pub stdout: String,
    /// Everything the engine wrote to its standard-error analog.
    pub stderr: String,
}

/// An evaluation that raised inside the engine.
///
/// Whatever the engine wrote before failing is preserved so the response can
/// still carry it; `message` is the failure description the loop appends to
/// the response's stderr field.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
    /// Output captured before the failure.
    pub stdout: String,
    pub stderr: String,
}

impl EvalError {
    /// A failure that produced no captured output.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Operations the command loop needs from an engine.
pub trait Engine {
    /// Evaluate caller code, saving any figures it produces as numbered PNG
    /// files under `staging`. Engine-level failures are returned as
    /// [`EvalError`], never panics — the session must outlive them.
    fn execute(&mut self, code: &str, staging: &Path) -> Result<EvalCapture, EvalError>;

    /// Tell the engine to shut down. Called once, on `quit`.
    fn shutdown(&mut self) -> Result<(), EngineError>;
}

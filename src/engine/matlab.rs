//! PyO3-backed MATLAB engine.
//!
//! Drives the engine through its Python binding (`matlab.engine`). All
//! communication happens inside `Python::attach` scopes; the engine object
//! is held as a `Py<PyAny>` for the lifetime of the session.
//!
//! Output capture relies on the binding's `eval(..., stdout=..., stderr=...)`
//! keyword arguments, which accept `io.StringIO` sinks. Two fresh sinks are
//! created per call and drained afterward regardless of the call's outcome.

use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyDict};

use crate::engine::{Engine, EngineError, EvalCapture, EvalError};
use crate::figures;

/// Live MATLAB engine instance.
///
/// Starting the engine spawns the MATLAB process; ownership of that process
/// transfers to this handle until [`Engine::shutdown`] or process exit.
pub struct MatlabEngine {
    engine: Py<PyAny>,
}

impl MatlabEngine {
    /// Import the engine binding and start a MATLAB instance.
    ///
    /// Both steps are fatal on failure: without the binding or a running
    /// engine the bridge has nothing to offer, so callers report the error
    /// and exit rather than retrying.
    pub fn start() -> Result<Self, EngineError> {
        Python::attach(|py| {
            let binding = py.import("matlab.engine").map_err(|err| {
                tracing::debug!("matlab.engine import failed: {}", err);
                EngineError::BindingMissing
            })?;

            let engine = binding
                .call_method0("start_matlab")
                .map_err(|err| EngineError::StartFailed(err.to_string()))?;

            tracing::info!("MATLAB engine started");
            Ok(Self {
                engine: engine.into(),
            })
        })
    }
}

impl Engine for MatlabEngine {
    fn execute(&mut self, code: &str, staging: &Path) -> Result<EvalCapture, EvalError> {
        let script = figures::capture_script(code, staging);

        Python::attach(|py| {
            let io = py
                .import("io")
                .map_err(|err| EvalError::new(err.to_string()))?;
            let out_sink = io
                .call_method0("StringIO")
                .map_err(|err| EvalError::new(err.to_string()))?;
            let err_sink = io
                .call_method0("StringIO")
                .map_err(|err| EvalError::new(err.to_string()))?;

            let kwargs = PyDict::new(py);
            kwargs
                .set_item("nargout", 0)
                .and_then(|()| kwargs.set_item("stdout", &out_sink))
                .and_then(|()| kwargs.set_item("stderr", &err_sink))
                .map_err(|err| EvalError::new(err.to_string()))?;

            let outcome = self
                .engine
                .bind(py)
                .call_method("eval", (script.as_str(),), Some(&kwargs));

            // Drain the sinks even when eval raised; partial output counts.
            let stdout = drain_string_io(&out_sink);
            let stderr = drain_string_io(&err_sink);

            match outcome {
                Ok(_) => Ok(EvalCapture { stdout, stderr }),
                Err(err) => Err(EvalError {
                    message: err.to_string(),
                    stdout,
                    stderr,
                }),
            }
        })
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        Python::attach(|py| {
            self.engine
                .bind(py)
                .call_method0("quit")
                .map(|_| ())
                .map_err(|err| EngineError::ShutdownFailed(err.to_string()))
        })
    }
}

/// Read back the accumulated contents of an `io.StringIO` sink.
fn drain_string_io(sink: &Bound<'_, PyAny>) -> String {
    sink.call_method0("getvalue")
        .and_then(|value| value.extract::<String>())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires a Python environment with matlab.engine installed
    fn start_matlab_engine() {
        pyo3::Python::initialize();
        let result = MatlabEngine::start();
        assert!(result.is_ok());
    }
}

//! Session protocol: readiness signaling and the command loop.
//!
//! The loop is deliberately synchronous and single-threaded. It blocks on
//! line reads, blocks on the engine call, and emits exactly one flushed JSON
//! line per `execute` — nothing for anything else. Malformed input and
//! engine failures are absorbed; only end of input, `quit`, or an unwritable
//! output stream end the session.
//!
//! The loop is generic over [`Engine`] so tests can substitute a scripted
//! fake, and over `BufRead`/`Write` so transcripts can run against in-memory
//! buffers.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::engine::{Engine, EngineError};
use crate::figures::{self, StagingDir};
use crate::protocol::{Command, ExecutionResult, Ready, StartupError};

/// Serialize one message as a JSON line and flush it immediately.
///
/// Flushing per message is part of the contract: the parent reads responses
/// without buffering delay.
pub fn emit<T: Serialize>(output: &mut impl Write, message: &T) -> Result<()> {
    let line = serde_json::to_string(message).context("Failed to serialize message")?;
    writeln!(output, "{line}").context("Failed to write message")?;
    output.flush().context("Failed to flush output")
}

/// Emit the one-time readiness signal.
pub fn announce_ready(output: &mut impl Write) -> Result<()> {
    emit(output, &Ready::new())
}

/// Report a fatal startup failure. The caller exits afterward; no loop runs.
pub fn announce_failure(output: &mut impl Write, error: &EngineError) -> Result<()> {
    emit(
        output,
        &StartupError {
            error: error.to_string(),
        },
    )
}

/// Run the command loop until `quit` or end of input.
///
/// End of input is a valid, if degenerate, exit path: when the parent closes
/// the pipe the loop simply stops, without telling the engine to quit.
pub fn run<E, R, W>(engine: &mut E, input: R, output: &mut W) -> Result<()>
where
    E: Engine,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line.context("Failed to read command line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Command::Unrecognized => {
                // Not reported back: the protocol has no way to say which
                // line failed.
                tracing::debug!("ignoring unrecognized input line");
            }
            Command::Quit => {
                if let Err(err) = engine.shutdown() {
                    tracing::warn!("engine shutdown failed during quit: {}", err);
                }
                break;
            }
            Command::Execute { code } => {
                let result = execute_request(engine, &code);
                emit(output, &result)?;
            }
        }
    }

    Ok(())
}

/// Handle one `execute` command. Infallible by construction: every engine
/// and filesystem failure ends up in the response's `stderr` field.
fn execute_request<E: Engine>(engine: &mut E, code: &str) -> ExecutionResult {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut artifacts = Vec::new();

    match StagingDir::create() {
        Ok(staging) => {
            match engine.execute(code, staging.path()) {
                Ok(capture) => {
                    stdout = capture.stdout;
                    stderr = capture.stderr;
                }
                Err(failure) => {
                    stdout = failure.stdout;
                    stderr = failure.stderr;
                    stderr.push_str(&failure.message);
                }
            }

            if staging.path().exists() {
                artifacts = figures::collect(staging.path(), &mut stderr);
            }
            staging.remove();
        }
        Err(err) => {
            // Mirrors an engine failure: reported in stderr, loop lives on.
            stderr.push_str(&err.to_string());
        }
    }

    ExecutionResult {
        stdout,
        stderr,
        figures: (!artifacts.is_empty()).then_some(artifacts),
    }
}

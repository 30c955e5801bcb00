//! Wire protocol for the bridge.
//!
//! These Rust structs define the line-delimited JSON messages exchanged with
//! the parent process over stdin/stdout. They use serde for (de)serialization
//! and mirror the shapes the parent's supervisor expects.

use serde::{Deserialize, Serialize};

/// One decoded request read from the input stream.
///
/// Dispatch is keyed on the `action` field. Anything the bridge does not
/// recognize — unknown actions, missing actions, payloads of the wrong
/// shape — collapses to `Unrecognized`, which the loop drops without a
/// response. Keeping that policy as an explicit variant (rather than a parse
/// error) makes the silent-ignore path visible at the dispatch site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Command {
    /// Run a chunk of MATLAB code and report its output and figures.
    Execute {
        /// Caller code, inlined verbatim into the capture script.
        /// Missing `code` means "run nothing".
        #[serde(default)]
        code: String,
    },
    /// Shut the engine down and end the session. No response is emitted.
    Quit,
    /// Fallback for any action this bridge does not handle.
    #[serde(other)]
    Unrecognized,
}

impl Command {
    /// Decode one input line into a `Command`.
    ///
    /// This never fails: lines that are not valid JSON, or valid JSON of the
    /// wrong shape, become `Command::Unrecognized`. The caller has already
    /// filtered out empty lines.
    pub fn parse(line: &str) -> Self {
        serde_json::from_str(line).unwrap_or(Command::Unrecognized)
    }
}

/// One generated figure, encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureArtifact {
    /// Base64-encoded image bytes (standard alphabet).
    pub data: String,
}

/// Response to a single `execute` command.
///
/// `figures` serializes as a JSON list when at least one figure was
/// harvested and as literal `null` otherwise — never as an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Text the engine wrote to its standard output during the call.
    pub stdout: String,
    /// Engine error text, plus any figure-extraction errors appended as
    /// extra lines.
    pub stderr: String,
    pub figures: Option<Vec<FigureArtifact>>,
}

/// Readiness signal, emitted exactly once after successful startup.
#[derive(Debug, Clone, Serialize)]
pub struct Ready {
    pub status: &'static str,
}

impl Ready {
    pub fn new() -> Self {
        Self { status: "ready" }
    }
}

impl Default for Ready {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal startup failure report. The process exits after emitting this.
#[derive(Debug, Clone, Serialize)]
pub struct StartupError {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_execute_with_code() {
        let cmd = Command::parse(r#"{"action":"execute","code":"x = 1+1;"}"#);
        assert_eq!(
            cmd,
            Command::Execute {
                code: "x = 1+1;".to_string()
            }
        );
    }

    #[test]
    fn parse_execute_defaults_missing_code_to_empty() {
        let cmd = Command::parse(r#"{"action":"execute"}"#);
        assert_eq!(
            cmd,
            Command::Execute {
                code: String::new()
            }
        );
    }

    #[test]
    fn parse_quit() {
        assert_eq!(Command::parse(r#"{"action":"quit"}"#), Command::Quit);
    }

    #[test]
    fn parse_quit_ignores_extra_fields() {
        assert_eq!(
            Command::parse(r#"{"action":"quit","reason":"done"}"#),
            Command::Quit
        );
    }

    #[test]
    fn parse_unknown_action_is_unrecognized() {
        assert_eq!(
            Command::parse(r#"{"action":"restart"}"#),
            Command::Unrecognized
        );
    }

    #[test]
    fn parse_missing_action_is_unrecognized() {
        assert_eq!(Command::parse(r#"{"code":"x = 1;"}"#), Command::Unrecognized);
    }

    #[test]
    fn parse_non_json_is_unrecognized() {
        assert_eq!(Command::parse("not json"), Command::Unrecognized);
        assert_eq!(Command::parse("42"), Command::Unrecognized);
        assert_eq!(Command::parse("[1,2,3]"), Command::Unrecognized);
    }

    #[test]
    fn parse_non_string_code_is_unrecognized() {
        assert_eq!(
            Command::parse(r#"{"action":"execute","code":123}"#),
            Command::Unrecognized
        );
    }

    #[test]
    fn result_serializes_absent_figures_as_null() {
        let result = ExecutionResult {
            stdout: "ans = 2\n".to_string(),
            stderr: String::new(),
            figures: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"stdout":"ans = 2\n","stderr":"","figures":null}"#);
    }

    #[test]
    fn result_serializes_figures_as_list() {
        let result = ExecutionResult {
            stdout: String::new(),
            stderr: String::new(),
            figures: Some(vec![FigureArtifact {
                data: "aGVsbG8=".to_string(),
            }]),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"stdout":"","stderr":"","figures":[{"data":"aGVsbG8="}]}"#
        );
    }

    #[test]
    fn ready_message_shape() {
        let json = serde_json::to_string(&Ready::new()).unwrap();
        assert_eq!(json, r#"{"status":"ready"}"#);
    }
}

//! Structured output formatting for CLI commands.
//!
//! Human output goes through [`OutputContext`], which honours `--quiet` and
//! `--json`. Machine output is wrapped in a [`JsonOutput`] or [`JsonError`]
//! envelope so every command produces the same top-level shape.

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::io::{self, Write};

/// Version of the JSON output format
const OUTPUT_VERSION: &str = "1.0.0";

// ============================================================================
// Output Context
// ============================================================================

/// Context for controlling output verbosity
pub struct OutputContext {
    quiet: bool,
    json: bool,
}

impl OutputContext {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Print essential output (always shown unless --json)
    pub fn print_data(&self, msg: impl Display) -> io::Result<()> {
        if !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print informational message (suppressed by --quiet or --json)
    pub fn print_info(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print warning (suppressed by --quiet or --json)
    pub fn print_warning(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe_stderr(&format!("Warning: {}", msg))
        } else {
            Ok(())
        }
    }

    /// Print error (always shown to stderr)
    pub fn print_error(&self, msg: impl Display) -> io::Result<()> {
        writeln_safe_stderr(&format!("Error: {}", msg))
    }

    /// Print a JSON document to stdout (only with --json)
    pub fn print_json<T: Serialize>(&self, output: &JsonOutput<T>) -> io::Result<()> {
        if self.json {
            let rendered = output.to_json_string().map_err(io::Error::other)?;
            writeln_safe(&rendered)
        } else {
            Ok(())
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Safe println that handles broken pipes gracefully
fn writeln_safe(msg: &str) -> io::Result<()> {
    match writeln!(io::stdout(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // Expected when piping to head
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

fn writeln_safe_stderr(msg: &str) -> io::Result<()> {
    match writeln!(io::stderr(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// JSON Output Types
// ============================================================================

/// Wrapper for successful command output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: Metadata,
}

impl<T: Serialize> JsonOutput<T> {
    /// `success` mirrors the command outcome, not merely "it ran".
    pub fn new(success: bool, data: T, command: impl Into<String>) -> Self {
        Self {
            success,
            data,
            metadata: Metadata::new(command),
        }
    }

    pub fn success(data: T, command: impl Into<String>) -> Self {
        Self::new(true, data, command)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Wrapper for error output with suggestions
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: Metadata,
}

impl JsonError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                suggestions: Vec::new(),
            },
            metadata: Metadata::new(command),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestions.push(suggestion.into());
        self
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (e.g. "INVALID_ARGUMENT")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Metadata included in all responses
#[derive(Debug, Serialize)]
pub struct Metadata {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    /// Version of the output format
    pub version: String,
    /// Command that generated this response
    pub command: String,
}

impl Metadata {
    fn new(command: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: OUTPUT_VERSION.to_string(),
            command: command.into(),
        }
    }
}

/// Serialize timestamp in ISO 8601 format
fn serialize_timestamp<S>(dt: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Process exit codes.
///
/// ```rust
/// use xlink::output::ExitCode;
///
/// assert_eq!(ExitCode::IntegrityFailed.code(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// No broken references (0)
    Success = 0,
    /// Broken references found, or repair incomplete (1)
    IntegrityFailed = 1,
    /// Invalid arguments or configuration (2)
    InvalidArgument = 2,
    /// Unexpected I/O failure (10)
    ExternalError = 10,
}

impl ExitCode {
    /// Convert exit code to i32 for `std::process::exit`
    pub fn code(self) -> i32 {
        self as i32
    }
}

// ============================================================================
// Error Codes (String constants for JSON responses)
// ============================================================================

pub struct ErrorCode;

impl ErrorCode {
    pub const INVALID_ARGUMENT: &'static str = "INVALID_ARGUMENT";
    pub const IO_ERROR: &'static str = "IO_ERROR";

    /// Code reported in a [`JsonError`] for an error raised in `run`.
    pub fn for_exit_code(exit: ExitCode) -> &'static str {
        match exit {
            ExitCode::InvalidArgument => Self::INVALID_ARGUMENT,
            _ => Self::IO_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_envelope() {
        let output = JsonOutput::success(serde_json::json!({"broken": 0}), "validate");
        let json: serde_json::Value =
            serde_json::from_str(&output.to_json_string().unwrap()).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["broken"], 0);
        assert_eq!(json["metadata"]["command"], "validate");
        assert_eq!(json["metadata"]["version"], OUTPUT_VERSION);
        assert!(json["metadata"]["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_failed_command_envelope() {
        let output = JsonOutput::new(false, serde_json::json!([]), "repair");
        let json: serde_json::Value =
            serde_json::from_str(&output.to_json_string().unwrap()).unwrap();
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_json_error_carries_suggestions() {
        let error = JsonError::new(ErrorCode::INVALID_ARGUMENT, "Unknown domain 'x'", "validate")
            .with_suggestion("Run 'xlink schema' to list domains");

        let json: serde_json::Value =
            serde_json::from_str(&error.to_json_string().unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INVALID_ARGUMENT");
        assert_eq!(json["error"]["suggestions"][0], "Run 'xlink schema' to list domains");
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::IntegrityFailed.code(), 1);
        assert_eq!(ExitCode::InvalidArgument.code(), 2);
        assert_eq!(ExitCode::ExternalError.code(), 10);
        assert_eq!(
            ErrorCode::for_exit_code(ExitCode::InvalidArgument),
            ErrorCode::INVALID_ARGUMENT
        );
        assert_eq!(ErrorCode::for_exit_code(ExitCode::ExternalError), ErrorCode::IO_ERROR);
    }
}

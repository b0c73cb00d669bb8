//! Structured error handling and exit codes.

use serde::Serialize;

use crate::actions::ActionError;
use crate::config::ConfigError;
use crate::duplicates::FinderError;

/// Exit codes for the dupechain binary.
///
/// - 0: Success
/// - 1: General error (unexpected runtime failure)
/// - 2: Configuration error (reported before any file is read)
/// - 3: Aborted (declined prompt, merge conflict, failed command)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Flags, config file or environment were invalid.
    ConfigError = 2,
    /// An action stopped the run on purpose.
    Aborted = 3,
    /// Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DC000",
            Self::GeneralError => "DC001",
            Self::ConfigError => "DC002",
            Self::Aborted => "DC003",
            Self::Interrupted => "DC130",
        }
    }

    /// Classify an error from `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<ConfigError>().is_some() {
            return Self::ConfigError;
        }
        if let Some(FinderError::Interrupted) = err.downcast_ref::<FinderError>() {
            return Self::Interrupted;
        }
        if let Some(action) = err.downcast_ref::<ActionError>() {
            if action.is_abort() {
                return Self::Aborted;
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DC002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

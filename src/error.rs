//! Structured error handling and exit codes.

use serde::Serialize;

use crate::cache::ComputeError;
use crate::producer::ProducerError;

/// Exit codes for the stackcache binary.
///
/// - 0: Success (a value was printed or the command completed)
/// - 1: General error (unexpected failure)
/// - 2: No result (key not cached, or the producer had nothing to return)
/// - 3: Producer failed (the wrapped command exited unsuccessfully)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed and produced its output.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No result: nothing cached and nothing produced.
    NoResult = 2,
    /// Producer failed: the wrapped computation returned an error.
    ProducerFailed = 3,
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
            Self::Success => "SC000",
            Self::GeneralError => "SC001",
            Self::NoResult => "SC002",
            Self::ProducerFailed => "SC003",
        }
    }

    /// Pick the exit code for an error returned by [`crate::run_app`].
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let producer_failed = err.chain().any(|cause| {
            cause.is::<ProducerError>()
                || cause
                    .downcast_ref::<ComputeError<ProducerError>>()
                    .is_some_and(|e| matches!(e, ComputeError::Producer(_)))
        });
        if producer_failed {
            Self::ProducerFailed
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "SC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
        }
    }
}

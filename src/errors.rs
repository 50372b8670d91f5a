//! Error types for the diagnostic pipeline.
//!
//! Three failure granularities exist and must stay distinct:
//! `MeasurementFailed` is absorbed per phase (best-effort continuation),
//! `InvalidInput` is rejected at the boundary, and `Unexpected` aborts the
//! whole run.

use std::error::Error;
use std::fmt;

use crate::sampler::Phase;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (provider unreachable, request failed).
    pub const NETWORK_ERROR: i32 = 1;
    /// Invalid input (unknown test type, quality tier, argument).
    pub const INPUT_ERROR: i32 = 2;
    /// Partial failure (some phases failed but the run completed).
    pub const PARTIAL_FAILURE: i32 = 4;
    /// Run cancelled by the user.
    pub const CANCELLED: i32 = 5;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// A diagnostic-pipeline error.
#[derive(Debug)]
pub enum DiagError {
    /// A single phase's sample generator could not produce a sample.
    /// Caught at phase granularity and converted into continuation.
    MeasurementFailed {
        phase: Phase,
        message: String,
    },
    /// Unrecognized test type, quality tier, or similar boundary input.
    /// Rejected immediately, never retried.
    InvalidInput {
        field: &'static str,
        message: String,
    },
    /// The network info provider failed.
    Network {
        message: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// Anything outside the per-phase boundary. Aborts the run.
    Unexpected {
        message: String,
    },
    /// The user cancelled the run; checked at every chunk boundary.
    Cancelled,
}

impl DiagError {
    pub fn measurement(phase: Phase, message: impl Into<String>) -> Self {
        DiagError::MeasurementFailed { phase, message: message.into() }
    }

    pub fn invalid_input(
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        DiagError::InvalidInput { field, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        DiagError::Network { message: message.into(), source: None }
    }

    pub fn network_with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        DiagError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        DiagError::Unexpected { message: message.into() }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DiagError::MeasurementFailed { .. } => exit_codes::PARTIAL_FAILURE,
            DiagError::InvalidInput { .. } => exit_codes::INPUT_ERROR,
            DiagError::Network { .. } => exit_codes::NETWORK_ERROR,
            DiagError::Unexpected { .. } => exit_codes::UNKNOWN_ERROR,
            DiagError::Cancelled => exit_codes::CANCELLED,
        }
    }

    /// A user-facing suggestion, when one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DiagError::MeasurementFailed { .. } => {
                Some("Other phases still ran; re-run the test for a full set.")
            }
            DiagError::Network { .. } => {
                Some("Check your internet connection and try again.")
            }
            _ => None,
        }
    }
}

impl fmt::Display for DiagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagError::MeasurementFailed { phase, message } => {
                write!(f, "{} test failed: {}", phase, message)
            }
            DiagError::InvalidInput { field, message } => {
                write!(f, "invalid {}: {}", field, message)
            }
            DiagError::Network { message, .. } => {
                write!(f, "network error: {}", message)
            }
            DiagError::Unexpected { message } => {
                write!(f, "unexpected failure: {}", message)
            }
            DiagError::Cancelled => write!(f, "test run cancelled"),
        }
    }
}

impl Error for DiagError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiagError::Network { source, .. } => {
                source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
            }
            _ => None,
        }
    }
}

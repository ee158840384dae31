//! Error types for the bestip system
//!
//! Three layers:
//! - [`Error`]: crate-wide errors (configuration, provider API calls)
//! - [`RunError`]: failures of one measurement run
//! - [`ReconcileError`]: failures of one record reconciliation
//!
//! `AllZeroThroughput` is deliberately absent here: it is a warning carried
//! on a successful selection (see [`crate::measurement::SelectionWarning`]).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bestip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the bestip system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The provider refused an update because the record already holds the value
    #[error("Record value unchanged ({provider}): {message}")]
    ValueUnchanged {
        /// Provider name
        provider: String,
        /// Provider message
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "value unchanged" error
    pub fn value_unchanged(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValueUnchanged {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the provider's "value unchanged" class
    pub fn is_value_unchanged(&self) -> bool {
        matches!(self, Self::ValueUnchanged { .. })
    }
}

/// Failure of a single measurement run
#[derive(Error, Debug)]
pub enum RunError {
    /// The candidate pool file does not exist
    #[error("candidate pool not found: {}", path.display())]
    MissingInput {
        /// Configured pool path
        path: PathBuf,
    },

    /// The measurement process could not be launched, timed out, or exited non-zero
    #[error("measurement process failed: {reason}")]
    ExecutionFailed {
        /// Short description (exit status, launch error, timeout)
        reason: String,
        /// Exit code, when the process ran to completion
        exit_code: Option<i32>,
        /// Combined stdout/stderr captured from the process
        output: String,
    },

    /// The report file could not be read or is not valid CSV
    #[error("failed to parse report {}: {reason}", path.display())]
    ParseFailed {
        /// Report path
        path: PathBuf,
        /// Parser or I/O error message
        reason: String,
    },

    /// The report has no usable data row
    #[error("no usable results in report: {0}")]
    EmptyReport(String),
}

impl RunError {
    /// Create an execution failure that never produced an exit code
    pub fn launch(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
            exit_code: None,
            output: String::new(),
        }
    }

    /// Create a parse failure for the given report path
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ParseFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an empty-report failure
    pub fn empty(reason: impl Into<String>) -> Self {
        Self::EmptyReport(reason.into())
    }
}

/// Failure of a single reconciliation
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Listing existing records failed
    #[error("record lookup failed: {0}")]
    LookupFailed(#[source] Error),

    /// Creating or updating the record failed
    #[error("record apply failed: {0}")]
    ApplyFailed(#[source] Error),
}

//! Error types for the query gateway.
//!
//! Every failure a caller can see maps onto one of these variants. None of
//! them carries a partial result.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The file or connection could not be reached (missing file, permission
    /// denied, host unreachable, etc.)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The read-only guard rejected the query.
    #[error("Unsafe query: {0}")]
    UnsafeQuery(String),

    /// The caller supplied options the gateway cannot work with.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The backend reported a failure (syntax error, missing table, etc.)
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Configuration errors (invalid config file, unknown connection name, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates a source-unavailable error with the given message.
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Creates an unsafe-query error with the given message.
    pub fn unsafe_query(msg: impl Into<String>) -> Self {
        Self::UnsafeQuery(msg.into())
    }

    /// Creates a malformed-input error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "Source Unavailable",
            Self::UnsafeQuery(_) => "Unsafe Query",
            Self::MalformedInput(_) => "Malformed Input",
            Self::ExecutionFailed(_) => "Execution Failed",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(error: sqlx::Error) -> Self {
        // Errors raised while opening a connection are mapped at the call site.
        match error {
            sqlx::Error::Database(db_error) => Self::ExecutionFailed(db_error.message().to_string()),
            other => Self::ExecutionFailed(other.to_string()),
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

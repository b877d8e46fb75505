//! Error handling for cityguard
//!
//! Errors are split by where they are allowed to surface. Validation problems
//! go back to the operator with a specific reason, a missing or corrupt model
//! is its own condition, and per-probe failures never leave the prober.

use thiserror::Error;

/// Main error type for the diagnostic engine
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model unavailable ({path}): {reason}")]
    ModelUnavailable { path: String, reason: String },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Malformed operator input. Always reported, never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("expected exactly {expected} values, got {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("value #{position} ({value:?}) is not a number")]
    NonNumeric { position: usize, value: String },

    #[error("line {line} has {found} columns, expected exactly {expected}")]
    ColumnCount { line: u64, expected: usize, found: usize },

    #[error("line {line}, column {column}: {value:?} is not a number")]
    NonNumericCell { line: u64, column: usize, value: String },

    #[error("no feature rows supplied")]
    EmptyInput,

    #[error("no ports specified")]
    EmptyPortList,

    #[error("invalid port {0}: ports must be in 1-65535")]
    InvalidPort(u32),

    #[error("malformed table: {0}")]
    Table(String),
}

/// Failure of a single port probe. Normalized to "closed" by the prober.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connection refused")]
    Refused,

    #[error("timed out")]
    Timeout,

    #[error("host unreachable")]
    Unreachable,

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionRefused => ProbeError::Refused,
            ErrorKind::TimedOut => ProbeError::Timeout,
            _ => {
                // HostUnreachable / NetworkUnreachable are not stable io kinds on our MSRV
                let text = e.to_string();
                if text.contains("unreachable") {
                    ProbeError::Unreachable
                } else {
                    ProbeError::Other(text)
                }
            }
        }
    }
}

impl From<tokio::time::error::Elapsed> for ProbeError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ProbeError::Timeout
    }
}

impl GuardError {
    /// Create a model-unavailable error for the artifact at `path`
    pub fn model_unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        GuardError::ModelUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error was caused by operator input rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(self, GuardError::Validation(_) | GuardError::InvalidTarget(_))
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GuardError::ModelUnavailable { .. } => 2,
            _ => 1,
        }
    }
}

/// Convert common errors to GuardError
impl From<std::net::AddrParseError> for GuardError {
    fn from(e: std::net::AddrParseError) -> Self {
        GuardError::InvalidTarget(e.to_string())
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(e: toml::de::Error) -> Self {
        GuardError::ConfigError(format!("Failed to parse TOML: {}", e))
    }
}

impl From<csv::Error> for ValidationError {
    fn from(e: csv::Error) -> Self {
        ValidationError::Table(e.to_string())
    }
}

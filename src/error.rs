//! Error types for the transfer relay

use std::fmt;
use thiserror::Error;

/// Stage of an attempt at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Build,
    Validate,
    Submit,
}

impl fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptStage::Build => "build",
            AttemptStage::Validate => "validate",
            AttemptStage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// Diagnostic record of one failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub stage: AttemptStage,
    pub source_endpoint: String,
    pub destination_endpoint: String,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} ({} via {} -> {}): {}",
            self.attempt, self.stage, self.source_endpoint, self.destination_endpoint, self.reason
        )
    }
}

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build failed against {endpoint}: {message}")]
    Build { endpoint: String, message: String },

    #[error("Dry-run rejected transfer: {0}")]
    Validation(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Exhausted {attempts} attempts{}", describe_recent(.recent))]
    ExhaustedRetries {
        attempts: u32,
        recent: Vec<AttemptFailure>,
    },

    #[error("Asset registry error: {0}")]
    Registry(String),

    #[error("Quote error: {0}")]
    Quote(String),

    #[error("RPC error on {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },
}

impl TransferError {
    /// Check if the error is handled by moving on to the next attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::Build { .. }
                | TransferError::Validation(_)
                | TransferError::Submission(_)
                | TransferError::Rpc { .. }
                | TransferError::Http(_)
                | TransferError::Timeout { .. }
        )
    }
}

fn describe_recent(recent: &[AttemptFailure]) -> String {
    match recent.last() {
        Some(last) => format!("; last failure: {}", last),
        None => String::new(),
    }
}

/// Result type for relay operations
pub type TransferResult<T> = Result<T, TransferError>;

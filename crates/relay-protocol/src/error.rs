//! Error types for the relay core.

use thiserror::Error;

use crate::task::TaskStatus;

/// Errors that can occur in relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("broadcast bus closed")]
    BusClosed,
}

impl RelayError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

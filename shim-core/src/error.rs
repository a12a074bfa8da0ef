//! Error types for the portability shim.

use thiserror::Error;

/// Errors that can occur inside the shim or its host layers.
#[derive(Error, Debug)]
pub enum ShimError {
    #[error("No free handle slot")]
    NoFreeHandle,

    #[error("Handle not open: {0}")]
    HandleNotFound(u8),

    #[error("Channel {0} is not open in that direction")]
    WrongDirection(u8),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for shim operations.
pub type ShimResult<T> = Result<T, ShimError>;

/// Failure category, kept after a guest call folds an error into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoFreeHandle,
    HandleNotFound,
    Io,
}

impl From<&ShimError> for FailureKind {
    fn from(err: &ShimError) -> Self {
        match err {
            ShimError::NoFreeHandle => FailureKind::NoFreeHandle,
            ShimError::HandleNotFound(_) => FailureKind::HandleNotFound,
            _ => FailureKind::Io,
        }
    }
}

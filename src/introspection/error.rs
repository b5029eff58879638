//! Introspection error types.

use thiserror::Error;

use crate::worker::WorkerError;

/// Result type for introspection operations.
pub type IntrospectionResult<T> = Result<T, IntrospectionError>;

/// Errors raised by a [`DatabaseIntrospection`](super::DatabaseIntrospection)
/// implementation.
#[derive(Error, Debug)]
pub enum IntrospectionError {
    /// A statement that does not start with `SELECT` was submitted.
    #[error("security violation: only SELECT statements may be executed (got `{0}`)")]
    SecurityViolation(String),

    /// The table does not exist or is not visible.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The database worker failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Any other backend failure.
    #[error("introspection failed: {0}")]
    Backend(String),
}

impl IntrospectionError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }

    /// Whether retrying the call could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Worker(err) => err.is_retriable(),
            _ => false,
        }
    }
}

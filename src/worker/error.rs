//! Database worker transport errors.

use std::io;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while talking to the database worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn database worker: {0}")]
    SpawnFailed(#[source] io::Error),

    #[error("worker binary not found (set worker.path in delve.toml)")]
    BinaryNotFound,

    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("failed to encode request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("failed to decode worker response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    #[error("worker request timed out after {0} seconds")]
    Timeout(u64),

    /// The worker exited or its response channel was dropped.
    #[error("database worker exited unexpectedly")]
    WorkerExited,

    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("worker rejected query: {0}")]
    QueryFailed(String),

    #[error("worker method not supported: {0}")]
    MethodNotFound(String),

    #[error("worker error: {message} (code: {code})")]
    Remote { code: String, message: String },
}

impl WorkerError {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map a worker error code onto a specific variant.
    pub fn classify(code: &str, message: &str) -> Self {
        match code {
            "CONNECTION_FAILED" => Self::ConnectionFailed(message.to_string()),
            "QUERY_FAILED" | "INVALID_REQUEST" => Self::QueryFailed(message.to_string()),
            "METHOD_NOT_FOUND" => Self::MethodNotFound(message.to_string()),
            "WORKER_EXITED" => Self::WorkerExited,
            _ => Self::remote(code, message),
        }
    }

    /// Check if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::WorkerExited | Self::ConnectionFailed(_)
        )
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for WorkerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::WorkerExited
    }
}

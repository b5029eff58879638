//! Per-call timeouts, run deadlines and cancellation.
//!
//! Every external call a run makes (introspection, language model) goes
//! through a [`CallGuard`]. The guard bounds the call by the per-call
//! timeout and by the run deadline, whichever comes first, and abandons it
//! as soon as the run's [`CancellationToken`] fires. Dropping the call's
//! future releases whatever it held.
//!
//! Timeouts and deadline expiry are ordinary call failures, contained like
//! any other error by the caller. Only cancellation stops a run.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Failure of a guarded call.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    #[error("call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The run deadline passed before or during the call.
    #[error("run deadline exceeded")]
    DeadlineExceeded,

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Inner(E),
}

/// Deadline and cancellation scope for one run.
///
/// Cheap to clone; clones share the cancellation token.
#[derive(Debug, Clone)]
pub struct CallGuard {
    cancel: CancellationToken,
    call_timeout: Duration,
    deadline: Option<Instant>,
}

impl CallGuard {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            call_timeout,
            deadline: None,
        }
    }

    /// A guard with no practical limits, for tests and offline use.
    pub fn unbounded() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }

    /// Bound the whole run to `run_timeout` from now.
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + run_timeout);
        self
    }

    /// Share a caller-owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run one external call under the guard.
    pub async fn call<T, E, F>(&self, fut: F) -> Result<T, CallError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if self.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        if self.deadline_passed() {
            return Err(CallError::DeadlineExceeded);
        }

        let call_limit = Instant::now() + self.call_timeout;
        let (limit, limited_by_run) = match self.deadline {
            Some(deadline) if deadline < call_limit => (deadline, true),
            _ => (call_limit, false),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            outcome = tokio::time::timeout_at(limit, fut) => match outcome {
                Ok(result) => result.map_err(CallError::Inner),
                Err(_) if limited_by_run => Err(CallError::DeadlineExceeded),
                Err(_) => Err(CallError::Timeout(self.call_timeout)),
            },
        }
    }
}

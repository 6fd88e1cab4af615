//! Deadline-Bounded Execution
//!
//! Every request runs as its own task raced against a fixed deadline. The
//! caller is unblocked by whichever finishes first:
//!
//! ```text
//!   caller ──spawn──> worker ──oneshot::Sender──┐
//!     │                                         ▼
//!     └── timeout(D, oneshot::Receiver) ── result | Exceeded
//! ```
//!
//! ## Fire and Abandon
//!
//! When the deadline wins, the worker is *not* cancelled. It keeps running to
//! completion; when it finally sends its result the receiver is already gone,
//! so the send fails and the result is dropped. The worker owns the only
//! sender and the caller owns the only receiver, so nothing is shared between
//! them once the caller has moved on.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcomes other than a delivered result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeadlineError {
    /// The deadline fired before the worker produced a result
    #[error("deadline of {}ms exceeded", .0.as_millis())]
    Exceeded(Duration),

    /// The worker dropped its result channel without sending (it panicked)
    #[error("worker stopped without producing a result")]
    WorkerLost,
}

/// Runs units of work under a fixed deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    timeout: Duration,
}

impl Deadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `work` concurrently and waits at most `timeout` for its result.
    ///
    /// The caller observes exactly one outcome: the work's output,
    /// [`DeadlineError::Exceeded`], or [`DeadlineError::WorkerLost`].
    pub async fn run<F, T>(&self, work: F) -> Result<T, DeadlineError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let output = work.await;
            if tx.send(output).is_err() {
                debug!("Worker finished after its deadline; result discarded");
            }
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => {
                warn!("Worker dropped its result channel");
                Err(DeadlineError::WorkerLost)
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Deadline exceeded; abandoning worker"
                );
                Err(DeadlineError::Exceeded(self.timeout))
            }
        }
    }
}

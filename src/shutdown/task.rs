//! Stoppable Background Tasks
//!
//! Every long-running task (expiry sweeper, append log) is spawned through
//! [`TaskHandle::spawn`]. The task body receives a [`StopSignal`] it can only
//! read; the handle keeps the write side and the task's `JoinHandle`.
//!
//! ```text
//!   TaskHandle ── watch::Sender<bool> ──> StopSignal (inside the task)
//!        │
//!        └──── JoinHandle<()> <──────────── task returns = acknowledged
//! ```
//!
//! [`TaskHandle::stop`] consumes the handle, so a task cannot be stopped twice
//! and its completion cannot be awaited twice.

use std::future::Future;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Errors reported while waiting for a background task to finish.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The task panicked (or was aborted) instead of returning
    #[error("background task '{name}' did not shut down cleanly: {source}")]
    TaskFailed {
        name: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Read side of a task's stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once a stop has been requested.
    ///
    /// Also resolves if the owning handle disappeared without asking, so an
    /// orphaned task never outlives its owner. Cancel-safe, for use in
    /// `tokio::select!`.
    pub async fn stopped(&mut self) {
        // Err means the sender is gone.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    /// Returns true if a stop has already been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// A handle to a running background task.
///
/// Dropping the handle requests a stop but does not wait for it.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawns `body` on the Tokio runtime, handing it the task's stop signal.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, rx) = watch::channel(false);
        let join = tokio::spawn(body(StopSignal { rx }));

        info!(task = name, "Background task started");

        Self {
            name,
            stop_tx,
            join: Some(join),
        }
    }

    /// The task's name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true once the task body has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Asks the task to stop and waits until it has.
    pub async fn stop(mut self) -> Result<(), ShutdownError> {
        debug!(task = self.name, "Requesting stop");
        self.stop_tx.send_replace(true);

        if let Some(join) = self.join.take() {
            join.await.map_err(|source| ShutdownError::TaskFailed {
                name: self.name,
                source,
            })?;
        }

        info!(task = self.name, "Background task stopped");
        Ok(())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.stop_tx.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_stop_waits_for_task() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handle = TaskHandle::spawn("test", move |mut stop| async move {
            stop.stopped().await;
            // Simulated drain work after the stop request.
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!handle.is_finished());
        handle.stop().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_signal_pending_until_requested() {
        let (tx, rx) = watch::channel(false);
        let mut signal = StopSignal { rx };

        let mut stopped = tokio_test::task::spawn(signal.stopped());
        assert_pending!(stopped.poll());

        tx.send_replace(true);
        assert!(stopped.is_woken());
        assert_ready!(stopped.poll());
        drop(stopped);
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn test_drop_requests_stop() {
        let exits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&exits);

        let handle = TaskHandle::spawn("dropped", move |mut stop| async move {
            stop.stopped().await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_reports_error() {
        let handle = TaskHandle::spawn("panicky", |mut stop| async move {
            stop.stopped().await;
            panic!("boom");
        });

        let err = handle.stop().await.unwrap_err();
        assert!(matches!(err, ShutdownError::TaskFailed { name: "panicky", .. }));
    }
}

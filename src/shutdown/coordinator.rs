//! Shutdown Coordinator
//!
//! Owns the handles of the background tasks and stops them in a fixed order
//! once the process is asked to terminate:
//!
//! ```text
//!   Running ──(signal)──> Draining ──> Stopped
//!                            │
//!                            ├─ 1. stop append log, wait for it
//!                            └─ 2. stop expiry sweeper, wait for it
//! ```
//!
//! The append log reads `written` flags on entries the sweeper would
//! otherwise be deleting, so it always drains first.

use crate::shutdown::{ShutdownError, TaskHandle};
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, info};

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Stops the background tasks in order.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    sweeper: TaskHandle,
    log_writer: Option<TaskHandle>,
    state_tx: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    /// Takes ownership of the sweeper and (if logging is enabled) the log
    /// writer. Nothing else can stop them afterwards.
    pub fn new(sweeper: TaskHandle, log_writer: Option<TaskHandle>) -> Self {
        let (state_tx, _) = watch::channel(ShutdownState::Running);
        Self {
            sweeper,
            log_writer,
            state_tx,
        }
    }

    /// Returns a receiver that observes state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ShutdownState {
        *self.state_tx.borrow()
    }

    /// Waits for `signal`, then drains.
    pub async fn run<S>(self, signal: S) -> Result<(), ShutdownError>
    where
        S: Future<Output = ()>,
    {
        signal.await;
        info!("Shutdown signal received");
        self.drain().await
    }

    /// Stops the log writer (if any) and then the sweeper, waiting for each.
    pub async fn drain(self) -> Result<(), ShutdownError> {
        let Self {
            sweeper,
            log_writer,
            state_tx,
        } = self;

        state_tx.send_replace(ShutdownState::Draining);
        info!("Draining background tasks");

        for task in log_writer.into_iter().chain(Some(sweeper)) {
            debug!(task = task.name(), "Waiting for task to drain");
            task.stop().await?;
        }

        state_tx.send_replace(ShutdownState::Stopped);
        info!("All background tasks stopped");
        Ok(())
    }
}

/// Resolves when the process receives Ctrl+C (or SIGTERM on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Spawns a task that records its name into `order` when it exits.
    fn recording_task(
        name: &'static str,
        drain_for: Duration,
        order: &Arc<Mutex<Vec<&'static str>>>,
    ) -> TaskHandle {
        let order = Arc::clone(order);
        TaskHandle::spawn(name, move |mut stop| async move {
            stop.stopped().await;
            tokio::time::sleep(drain_for).await;
            order.lock().unwrap().push(name);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_writer_drains_before_sweeper() {
        let order = Arc::new(Mutex::new(Vec::new()));

        // The log writer takes longer to drain; it must still finish first.
        let sweeper = recording_task("sweeper", Duration::from_millis(1), &order);
        let log_writer = recording_task("log-writer", Duration::from_millis(500), &order);

        let coordinator = ShutdownCoordinator::new(sweeper, Some(log_writer));
        coordinator.drain().await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["log-writer", "sweeper"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_without_log_writer() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let sweeper = recording_task("sweeper", Duration::ZERO, &order);

        let coordinator = ShutdownCoordinator::new(sweeper, None);
        let mut state = coordinator.subscribe();
        assert_eq!(coordinator.state(), ShutdownState::Running);

        coordinator.drain().await.unwrap();

        assert_eq!(*state.borrow_and_update(), ShutdownState::Stopped);
        assert_eq!(*order.lock().unwrap(), vec!["sweeper"]);
    }

    #[tokio::test]
    async fn test_run_waits_for_signal() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let sweeper = recording_task("sweeper", Duration::ZERO, &order);
        let coordinator = ShutdownCoordinator::new(sweeper, None);
        let mut state = coordinator.subscribe();

        let (trigger, signal) = oneshot::channel::<()>();
        let running = tokio::spawn(coordinator.run(async {
            let _ = signal.await;
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*state.borrow(), ShutdownState::Running);
        assert!(order.lock().unwrap().is_empty());

        trigger.send(()).unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(*state.borrow_and_update(), ShutdownState::Stopped);
        assert_eq!(*order.lock().unwrap(), vec!["sweeper"]);
    }
}

//! Append Log Writer
//!
//! Every `log_write_interval` the writer claims the entries that have not been
//! logged yet and appends one line per entry to the run's log file:
//!
//! ```text
//! 2026-10-19T08:15:02.123456789+00:00 --> foo = bar
//! ```
//!
//! ## One Pass
//!
//! 1. Under the store lock: flip `written` on every unwritten entry and take
//!    snapshots of them (the claim).
//! 2. Without the lock: open the file in append mode, write, flush, close.
//! 3. On failure: hand the claim back so the next tick retries it.
//!
//! Entries already written are never claimed again, so a pass with no new
//! `SET` in between writes nothing.

use crate::config::Config;
use crate::shutdown::{StopSignal, TaskHandle};
use crate::storage::{Entry, Store};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Errors raised by a single flush pass.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write log file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Appends newly set entries to a per-run log file.
#[derive(Debug)]
pub struct AppendLog {
    store: Arc<Store>,
    path: PathBuf,
    interval: Duration,
}

impl AppendLog {
    pub fn new(store: Arc<Store>, path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            store,
            path: path.into(),
            interval,
        }
    }

    /// Creates a writer for the run that started at `started_at`.
    ///
    /// The file is `<log_dir>/<unix seconds>.log`.
    pub fn from_config(store: Arc<Store>, config: &Config, started_at: DateTime<Utc>) -> Self {
        let path = config
            .log_dir
            .join(format!("{}.log", started_at.timestamp()));
        Self::new(store, path, config.log_write_interval())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs one flush pass.
    ///
    /// # Returns
    ///
    /// The number of lines appended.
    pub async fn flush(&self) -> Result<usize, LogError> {
        let claims = self.store.claim_unwritten();
        if claims.is_empty() {
            return Ok(0);
        }

        match self.append(&claims).await {
            Ok(()) => Ok(claims.len()),
            Err(e) => {
                let released = self.store.release_claims(&claims);
                debug!(released, "Returned unlogged entries for retry");
                Err(e)
            }
        }
    }

    async fn append(&self, claims: &[(String, Entry)]) -> Result<(), LogError> {
        let timestamp = Utc::now().to_rfc3339();
        let lines: String = claims
            .iter()
            .map(|(key, entry)| format!("{} --> {} = {}\n", timestamp, key, entry.value()))
            .collect();

        let open_err = |source| LogError::Open {
            path: self.path.clone(),
            source,
        };
        let write_err = |source| LogError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(open_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(open_err)?;

        file.write_all(lines.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(())
    }

    /// Runs a pass and reports the outcome; errors never escape the writer.
    async fn flush_logged(&self) {
        match self.flush().await {
            Ok(0) => {}
            Ok(lines) => debug!(lines, path = %self.path.display(), "Flushed append log"),
            Err(e) => warn!(error = %e, "Append log flush failed; will retry next tick"),
        }
    }

    /// Starts the periodic writer.
    ///
    /// On stop, the writer finishes its current pass, runs one last pass for
    /// anything set since, and exits.
    pub fn start(self) -> TaskHandle {
        TaskHandle::spawn("append-log", move |stop| writer_loop(self, stop))
    }
}

async fn writer_loop(log: AppendLog, mut stop: StopSignal) {
    match Instant::now().checked_add(log.interval) {
        Some(first_tick) => {
            let mut ticker = time::interval_at(first_tick, log.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!(path = %log.path.display(), "Append log running");

            loop {
                tokio::select! {
                    biased;
                    _ = stop.stopped() => break,
                    _ = ticker.tick() => log.flush_logged().await,
                }
            }
        }
        None => {
            warn!(
                interval_secs = log.interval.as_secs(),
                "Log write interval overflows the clock; logging only on shutdown"
            );
            stop.stopped().await;
        }
    }

    debug!("Append log received shutdown signal; draining");
    log.flush_logged().await;
}

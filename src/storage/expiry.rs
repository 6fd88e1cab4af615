//! Background Expiry Sweeper
//!
//! `Store::get` never looks at expiry, so this task is the only thing that
//! removes expired entries. It wakes every `sweep_interval`, removes every
//! entry whose expiry is strictly before the tick instant, and goes back to
//! sleep.
//!
//! ```text
//!   Idle ──(tick)──> Scanning ──> Idle
//!     │
//!     └──(stop)──> Stopped
//! ```
//!
//! A scan runs to completion under the store lock; a stop request is only
//! observed between scans.

use crate::shutdown::{StopSignal, TaskHandle};
use crate::storage::Store;
use std::sync::Arc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Starts the expiry sweeper for `store`.
///
/// The sweeper runs until the returned handle is stopped (or dropped).
///
/// # Example
///
/// ```ignore
/// use ttlkv::storage::{ExpirySweeper, Store};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let store = Arc::new(Store::new(Duration::from_secs(10), Duration::from_secs(1)));
/// let sweeper = ExpirySweeper::start(Arc::clone(&store));
///
/// // ...
///
/// sweeper.stop().await?;
/// ```
#[derive(Debug)]
pub struct ExpirySweeper;

impl ExpirySweeper {
    pub fn start(store: Arc<Store>) -> TaskHandle {
        TaskHandle::spawn("expiry-sweeper", move |stop| sweeper_loop(store, stop))
    }
}

/// The main sweeper loop.
async fn sweeper_loop(store: Arc<Store>, mut stop: StopSignal) {
    let period = store.sweep_interval();
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(
            interval_secs = period.as_secs(),
            "Sweep interval overflows the clock; expiry sweeper idle until stopped"
        );
        stop.stopped().await;
        return;
    };
    let mut ticker = time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(interval_ms = period.as_millis() as u64, "Expiry sweeper running");

    loop {
        tokio::select! {
            biased;
            _ = stop.stopped() => {
                debug!("Expiry sweeper received shutdown signal");
                break;
            }
            tick = ticker.tick() => {
                let removed = store.remove_expired(tick);
                if removed > 0 {
                    debug!(
                        expired = removed,
                        keys_remaining = store.len(),
                        "Expired keys cleaned up"
                    );
                }
            }
        }
    }
}

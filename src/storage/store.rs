//! Thread-Safe TTL Store
//!
//! This module implements the key-value map shared by request handlers, the
//! expiry sweeper and the append log.
//!
//! ## Design Decisions
//!
//! 1. **One Mutex**: every read and write is serialized by a single exclusive
//!    lock.
//! 2. **First Writer Wins**: `set` never overwrites. A second `set` for a live
//!    key fails and leaves the original untouched.
//! 3. **Sweeper-Only Expiry**: `get` returns logically expired entries until
//!    the next sweep removes them. The staleness window is bounded by the
//!    sweep interval.
//!
//! The lock is only ever held for one map operation or one scan pass. It is
//! never held across an `.await`.

use crate::config::Config;
use crate::storage::Entry;
use std::collections::hash_map::{self, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Error returned by [`Store::set`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetError {
    /// The key is already present; the existing entry was left untouched
    #[error("{0} already added")]
    AlreadyExists(String),

    /// The TTL puts the expiry beyond what the clock can represent
    #[error("invalid expire time")]
    InvalidTtl(Duration),
}

/// The process-wide cache.
///
/// Wrap it in an `Arc` and share it between the request path and the
/// background tasks.
///
/// # Example
///
/// ```
/// use ttlkv::storage::Store;
/// use std::time::Duration;
///
/// let store = Store::new(Duration::from_secs(10), Duration::from_secs(1));
///
/// store.set("name", "alice", Duration::ZERO).unwrap();
/// assert_eq!(store.get("name").unwrap().value(), "alice");
///
/// // No overwrite
/// assert!(store.set("name", "someone else", Duration::ZERO).is_err());
/// ```
#[derive(Debug)]
pub struct Store {
    entries: Mutex<HashMap<String, Entry>>,
    /// TTL used when `set` is called with a zero TTL
    default_ttl: Duration,
    /// How often the expiry sweeper scans this store
    sweep_interval: Duration,
}

impl Store {
    /// Creates an empty store.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            sweep_interval,
        }
    }

    /// Creates an empty store using the configured TTL and sweep interval.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_ttl(), config.sweep_interval())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Acquires the store lock, recovering from poisoning. Every critical
    /// section is a single map call or a `retain`.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new entry.
    ///
    /// A zero `ttl` means "use the default TTL". Fails with
    /// [`SetError::AlreadyExists`] if the key is present, whether or not that
    /// entry has logically expired, and with [`SetError::InvalidTtl`] if the
    /// expiry instant would overflow. A rejected call leaves the store as it
    /// was.
    ///
    /// # Returns
    ///
    /// A snapshot of the inserted entry.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Duration,
    ) -> Result<Entry, SetError> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        // Built before taking the lock so an invalid TTL never touches the map.
        let entry = Entry::with_ttl(value.into(), ttl).ok_or(SetError::InvalidTtl(ttl))?;

        let mut entries = self.lock();
        match entries.entry(key.into()) {
            hash_map::Entry::Occupied(occupied) => {
                trace!(key = %occupied.key(), "Rejected set for existing key");
                Err(SetError::AlreadyExists(occupied.key().clone()))
            }
            hash_map::Entry::Vacant(vacant) => {
                trace!(key = %vacant.key(), ttl_secs = ttl.as_secs(), "Inserted key");
                Ok(vacant.insert(entry).clone())
            }
        }
    }

    /// Returns a snapshot of the entry for `key`.
    ///
    /// Expiry is not checked here.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.lock().get(key).cloned()
    }

    /// Returns the number of entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every entry whose expiry is strictly before `now`.
    ///
    /// This is one sweep pass, run by the expiry sweeper.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    pub fn remove_expired(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Marks every unwritten entry as written and returns snapshots of them.
    ///
    /// The caller owns the returned claims: it either records them or hands
    /// them back through [`Store::release_claims`].
    pub(crate) fn claim_unwritten(&self) -> Vec<(String, Entry)> {
        let mut entries = self.lock();
        entries
            .iter_mut()
            .filter(|(_, entry)| !entry.is_written())
            .map(|(key, entry)| {
                entry.set_written(true);
                (key.clone(), entry.clone())
            })
            .collect()
    }

    /// Clears the written flag on claims that could not be recorded.
    ///
    /// Claims whose entry was swept (or swept and set again) in the meantime
    /// are skipped.
    ///
    /// # Returns
    ///
    /// The number of entries returned to the unwritten state.
    pub(crate) fn release_claims(&self, claims: &[(String, Entry)]) -> usize {
        let mut entries = self.lock();
        let mut released = 0;
        for (key, claimed) in claims {
            if let Some(entry) = entries.get_mut(key) {
                if entry.same_record(claimed) {
                    entry.set_written(false);
                    released += 1;
                }
            }
        }
        released
    }
}

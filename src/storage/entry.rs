//! Cached Records
//!
//! An [`Entry`] is the value half of one mapping in the [`Store`](super::Store).
//! Its expiry instant is fixed when the entry is created; the only field that
//! ever changes afterwards is the `written` flag owned by the append log.

use std::time::Duration;
use tokio::time::Instant;

/// A single cached record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The stored value
    value: String,
    /// Absolute instant after which the sweeper may evict this entry
    expires_at: Instant,
    /// Set once the entry has been appended to the write log
    written: bool,
}

impl Entry {
    /// Creates an unwritten entry that expires `ttl` from now.
    ///
    /// Returns `None` if `now + ttl` is past what an `Instant` can hold.
    pub fn with_ttl(value: String, ttl: Duration) -> Option<Self> {
        let expires_at = Instant::now().checked_add(ttl)?;
        Some(Self {
            value,
            expires_at,
            written: false,
        })
    }

    /// Returns the stored value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the expiry instant.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns true once the append log has recorded this entry.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Checks whether the entry's expiry is strictly before `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at < now
    }

    /// Time left until expiry, zero if it has already passed.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// True if `other` is the same record, ignoring the written flag.
    pub(crate) fn same_record(&self, other: &Entry) -> bool {
        self.expires_at == other.expires_at && self.value == other.value
    }

    pub(crate) fn set_written(&mut self, written: bool) {
        self.written = written;
    }
}

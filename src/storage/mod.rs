//! Storage Module
//!
//! The TTL store shared by every part of the cache, and the background task
//! that evicts expired entries from it.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Store                    │
//! │   Mutex<HashMap<String, Entry>>          │
//! └──────────────────────────────────────────┘
//!        ▲                 ▲              ▲
//!        │ set / get       │ sweep        │ claim unwritten
//!  request workers   ExpirySweeper    append log
//! ```
//!
//! ## Example
//!
//! ```
//! use ttlkv::storage::Store;
//! use std::time::Duration;
//!
//! let store = Store::new(Duration::from_secs(10), Duration::from_secs(1));
//!
//! // Zero TTL falls back to the default (10s here)
//! store.set("session", "token123", Duration::ZERO).unwrap();
//! assert_eq!(store.get("session").unwrap().value(), "token123");
//! ```

pub mod entry;
pub mod expiry;
pub mod store;

pub use entry::Entry;
pub use expiry::ExpirySweeper;
pub use store::{SetError, Store};

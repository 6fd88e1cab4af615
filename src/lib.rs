//! # ttlkv - An In-Memory Key-Value Cache with Per-Entry TTL
//!
//! ttlkv serves `SET`/`GET` over the Redis wire protocol (RESP). Every entry
//! carries its own time-to-live; a background sweeper evicts expired entries,
//! every request is bounded by a write deadline, and an optional append-only
//! log records each entry once.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                                ttlkv                                 │
//! │                                                                      │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────┐                │
//! │  │ TCP Server │──>│ Connection │──>│ CommandHandler │                │
//! │  │ (Listener) │   │  Handler   │   │  + Deadline    │                │
//! │  └────────────┘   └────────────┘   └───────┬────────┘                │
//! │                                            │ worker task             │
//! │                                            ▼                         │
//! │                          ┌───────────────────────────────┐           │
//! │                          │   Store (Mutex<HashMap>)      │           │
//! │                          └───────────────────────────────┘           │
//! │                               ▲                    ▲                 │
//! │                               │                    │                 │
//! │                     ┌─────────┴────────┐  ┌────────┴────────┐        │
//! │                     │  ExpirySweeper   │  │   AppendLog     │        │
//! │                     └─────────▲────────┘  └────────▲────────┘        │
//! │                               │  stop 2nd          │  stop 1st       │
//! │                          ┌────┴────────────────────┴────┐            │
//! │                          │     ShutdownCoordinator      │            │
//! │                          └──────────────────────────────┘            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ttlkv::{CommandHandler, Config, ExpirySweeper, ShutdownCoordinator, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = Arc::new(Store::from_config(&config));
//!
//!     let sweeper = ExpirySweeper::start(Arc::clone(&store));
//!     let coordinator = ShutdownCoordinator::new(sweeper, None);
//!
//!     let handler = CommandHandler::from_config(Arc::clone(&store), &config);
//!     let response = handler.set("foo".into(), "bar".into(), None).await?;
//!     assert!(response.success);
//!
//!     coordinator.drain().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Semantics Worth Knowing
//!
//! - **No overwrite**: `SET` on a key that is present fails; the first writer
//!   wins until the entry is swept.
//! - **Sweeper-only expiry**: `GET` can return an entry whose TTL has passed
//!   but which the sweeper has not reached yet (at most one sweep interval).
//! - **Fire and abandon**: a request that misses its deadline is answered with
//!   a timeout; its worker still runs to completion and its result is dropped.
//!
//! ## Module Overview
//!
//! - [`storage`]: The TTL store and the expiry sweeper
//! - [`commands`]: Request operations, the deadline executor, command dispatch
//! - [`journal`]: The append-only write log
//! - [`shutdown`]: Stoppable task handles and the shutdown coordinator
//! - [`protocol`]: RESP request parser and reply encoder
//! - [`connection`]: Client connection management
//! - [`config`]: Immutable process configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod journal;
pub mod protocol;
pub mod shutdown;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Deadline, DeadlineError, Response};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use journal::AppendLog;
pub use shutdown::{ShutdownCoordinator, TaskHandle};
pub use storage::{Entry, ExpirySweeper, Store};

/// Version of ttlkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

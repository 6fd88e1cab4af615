//! Append-Only Write Log
//!
//! When enabled, every entry set during the run is appended once to a log
//! file named after the run's start time. The log is a record of writes,
//! not a persistence layer: nothing reads it back on startup.

pub mod writer;

pub use writer::{AppendLog, LogError};

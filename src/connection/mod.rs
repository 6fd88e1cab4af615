//! Connection Module
//!
//! One task per client connection: read bytes into a `BytesMut` buffer,
//! parse as many complete requests as it holds, execute each one and write
//! the reply back before reading again.
//!
//! ## Example
//!
//! ```ignore
//! use ttlkv::commands::CommandHandler;
//! use ttlkv::connection::{handle_connection, ConnectionStats};
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(
//!     stream,
//!     addr,
//!     handler.clone(),
//!     config.idle_timeout(),
//!     Arc::clone(&stats),
//! ));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};

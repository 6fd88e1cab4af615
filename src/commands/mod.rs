//! Command Module
//!
//! The request path between the wire and the store.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  parse args, encode reply
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Deadline     │  worker task raced against the write timeout
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ handle_set/get  │  validate, touch the Store, build a Response
//! └─────────────────┘
//! ```

pub mod deadline;
pub mod handler;
pub mod request;

pub use deadline::{Deadline, DeadlineError};
pub use handler::{Command, CommandHandler, CommandStats};
pub use request::{handle_get, handle_set, RequestError, Response};

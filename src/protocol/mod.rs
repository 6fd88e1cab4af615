//! RESP Protocol
//!
//! The thin wire layer in front of the cache: requests are parsed from RESP
//! arrays (or inline commands) and replies are encoded as RESP values.
//!
//! ## Modules
//!
//! - `types`: The `RespValue` reply type and its encoder
//! - `parser`: Incremental request parser
//!
//! ## Example
//!
//! ```
//! use ttlkv::protocol::{parse_request, RespValue};
//!
//! let (request, consumed) = parse_request(b"GET name\r\n").unwrap().unwrap();
//! assert_eq!(request.len(), 2);
//! assert_eq!(consumed, 10);
//!
//! let reply = RespValue::bulk_string("bar");
//! assert_eq!(&reply.to_bytes()[..], b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_request, ParseError, ParseResult, Request};
pub use types::RespValue;

//! RESP Reply Types
//!
//! Replies are sent back to clients in the Redis Serialization Protocol so
//! `redis-cli` and ordinary Redis client libraries can talk to the cache.
//!
//! | Reply                 | Wire form                |
//! |-----------------------|--------------------------|
//! | `SimpleString("OK")`  | `+OK\r\n`                |
//! | `Error("ERR ..")`     | `-ERR ..\r\n`            |
//! | `Integer(7)`          | `:7\r\n`                 |
//! | `BulkString("bar")`   | `$3\r\nbar\r\n`          |
//! | `Null`                | `$-1\r\n`                |

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply sent to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status reply. Must not contain CR or LF.
    SimpleString(String),

    /// Error reply. By convention starts with an upper-case error kind
    /// (`ERR`, `TIMEOUT`).
    Error(String),

    Integer(i64),

    /// Binary-safe string.
    BulkString(Bytes),

    /// The null bulk string.
    Null,
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn ok() -> Self {
        Self::simple_string("OK")
    }

    pub fn pong() -> Self {
        Self::simple_string("PONG")
    }

    /// Appends the wire form of this reply to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buf.put_u8(prefix::SIMPLE_STRING);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.put_u8(prefix::ERROR);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.put_u8(prefix::INTEGER);
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.put_u8(prefix::BULK_STRING);
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_slice(b"$-1\r\n");
            }
        }
    }

    /// Returns the wire form of this reply.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

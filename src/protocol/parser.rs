//! RESP Request Parser
//!
//! Clients send each command either as a RESP array of bulk strings
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
//! ```
//!
//! or as an inline command (what you get from `telnet` or `nc`):
//!
//! ```text
//! SET foo bar\r\n
//! ```
//!
//! [`parse_request`] returns:
//! - `Ok(Some((args, consumed)))` - a complete command, `consumed` bytes used
//! - `Ok(None)` - the command is incomplete, read more data
//! - `Err(ParseError)` - the bytes are not a valid command

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid integer in a length header
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Bulk string length is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative or zero
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// An array element was not a bulk string
    #[error("expected bulk string, got prefix {0:#04x}")]
    ExpectedBulkString(u8),

    /// Protocol violation (missing CRLF, empty inline command, ...)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed command: name followed by its arguments.
pub type Request = Vec<Bytes>;

/// Maximum size of a single bulk string
pub const MAX_BULK_SIZE: usize = 1024 * 1024;

/// Maximum number of arguments in one command
pub const MAX_ARGS: usize = 1024;

/// Parses one command from the front of `buf`.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    match buf.first() {
        None => Ok(None),
        Some(&prefix::ARRAY) => parse_array(buf),
        Some(_) => parse_inline(buf),
    }
}

/// Parses `*<count>\r\n` followed by `count` bulk strings.
fn parse_array(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    let (count, mut consumed) = match parse_header(buf)? {
        Some(header) => header,
        None => return Ok(None),
    };

    if count <= 0 {
        return Err(ParseError::InvalidArrayLength(count));
    }
    let count = count as usize;
    if count > MAX_ARGS {
        return Err(ParseError::MessageTooLarge {
            size: count,
            max: MAX_ARGS,
        });
    }

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        match parse_bulk_string(&buf[consumed..])? {
            Some((arg, used)) => {
                args.push(arg);
                consumed += used;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((args, consumed)))
}

/// Parses `$<length>\r\n<data>\r\n`.
fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
    match buf.first() {
        None => return Ok(None),
        Some(&prefix::BULK_STRING) => {}
        Some(&other) => return Err(ParseError::ExpectedBulkString(other)),
    }

    let (length, data_start) = match parse_header(buf)? {
        Some(header) => header,
        None => return Ok(None),
    };

    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }
    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let total = data_start + length + CRLF.len();
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[data_start + length..total] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
    Ok(Some((data, total)))
}

/// Parses the `<prefix><integer>\r\n` header line shared by arrays and bulk
/// strings. Returns the integer and the header's length.
fn parse_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let digits = std::str::from_utf8(&buf[1..1 + end])
        .map_err(|e| ParseError::InvalidInteger(e.to_string()))?;
    let n: i64 = digits
        .parse()
        .map_err(|_| ParseError::InvalidInteger(digits.to_string()))?;

    Ok(Some((n, 1 + end + CRLF.len())))
}

/// Parses a whitespace-separated inline command terminated by CRLF.
fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    let end = match find_crlf(buf) {
        Some(pos) => pos,
        None if buf.len() > MAX_BULK_SIZE => {
            return Err(ParseError::MessageTooLarge {
                size: buf.len(),
                max: MAX_BULK_SIZE,
            })
        }
        None => return Ok(None),
    };

    let args: Request = buf[..end]
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();

    if args.is_empty() {
        return Err(ParseError::ProtocolError(
            "empty inline command".to_string(),
        ));
    }

    Ok(Some((args, end + CRLF.len())))
}

/// Finds the position of CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Request {
        parts.iter().map(|p| Bytes::from(p.to_string())).collect()
    }

    #[test]
    fn test_parse_set_command() {
        let input = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        let (request, consumed) = parse_request(input).unwrap().unwrap();
        assert_eq!(request, args(&["SET", "foo", "bar"]));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_incomplete() {
        assert!(parse_request(b"").unwrap().is_none());
        assert!(parse_request(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
        assert!(parse_request(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").unwrap().is_none());
        assert!(parse_request(b"GET foo").unwrap().is_none());
    }

    #[test]
    fn test_parse_pipelined_leaves_rest() {
        let input = b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
        let (request, consumed) = parse_request(input).unwrap().unwrap();
        assert_eq!(request, args(&["PING"]));

        let (request, _) = parse_request(&input[consumed..]).unwrap().unwrap();
        assert_eq!(request, args(&["GET", "k"]));
    }

    #[test]
    fn test_parse_inline_command() {
        let input = b"SET  foo   bar\r\n";
        let (request, consumed) = parse_request(input).unwrap().unwrap();
        assert_eq!(request, args(&["SET", "foo", "bar"]));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_empty_inline_rejected() {
        assert!(matches!(
            parse_request(b"   \r\n"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let input = b"*3\r\n$3\r\nSET\r\n$0\r\n\r\n$1\r\nv\r\n";
        let (request, _) = parse_request(input).unwrap().unwrap();
        assert_eq!(request, args(&["SET", "", "v"]));
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let input = b"*1\r\n$5\r\nhel\x00o\r\n";
        let (request, _) = parse_request(input).unwrap().unwrap();
        assert_eq!(request[0], Bytes::from(&b"hel\x00o"[..]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_request(b"*x\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert_eq!(
            parse_request(b"*0\r\n"),
            Err(ParseError::InvalidArrayLength(0))
        );
        assert_eq!(
            parse_request(b"*1\r\n:1\r\n"),
            Err(ParseError::ExpectedBulkString(b':'))
        );
        assert_eq!(
            parse_request(b"*1\r\n$-1\r\n"),
            Err(ParseError::InvalidBulkLength(-1))
        );
        assert!(matches!(
            parse_request(b"*1\r\n$3\r\nfooXX"),
            Err(ParseError::ProtocolError(_))
        ));
    }
}

//! Reply Encoding
//!
//! BlitzDB answers every request line with exactly one reply. Replies use a
//! small, line-oriented subset of the Redis encoding:
//!
//! - `+` Simple string: `+OK\r\n`, `+PONG\r\n`
//! - `-` Error: `-ERR <message>\r\n`
//! - `:` Integer: `:1\r\n`
//! - `$` Bulk string: `$3\r\nbar\r\n`
//! - `$-1` Nil: `$-1\r\n`
//!
//! There are no arrays and no nested values; a request never produces more
//! than one of these.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used by every reply
pub const CRLF: &[u8] = b"\r\n";

/// Reply type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
}

/// Every error reply starts with this code, followed by the message.
pub const ERROR_CODE: &str = "ERR";

/// A single reply sent back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status reply such as `OK` or `PONG`.
    /// Must not contain CR or LF.
    SimpleString(&'static str),

    /// Error reply. The message is written after the `ERR` code.
    Error(String),

    /// 64-bit signed integer (deleted counts, NX/XX failure sentinel).
    Integer(i64),

    /// Length-prefixed, binary-safe value.
    BulkString(Bytes),

    /// The distinguished "no value" reply.
    Nil,
}

impl Reply {
    /// Generic success.
    pub fn ok() -> Self {
        Reply::SimpleString("OK")
    }

    /// Reply to PING.
    pub fn pong() -> Self {
        Reply::SimpleString("PONG")
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use blitzdb::protocol::Reply;
    /// let err = Reply::error("no command");
    /// assert_eq!(err.serialize(), b"-ERR no command\r\n");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates a bulk string reply.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        Reply::BulkString(data.into())
    }

    pub fn nil() -> Self {
        Reply::Nil
    }

    /// Bulk string if a value is present, nil otherwise.
    pub fn from_optional(value: Option<Bytes>) -> Self {
        match value {
            Some(v) => Reply::BulkString(v),
            None => Reply::Nil,
        }
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(message) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(ERROR_CODE.as_bytes());
                buf.push(b' ');
                // A message must stay on one line or it would desync the client
                buf.extend(
                    message
                        .bytes()
                        .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
                );
                buf.extend_from_slice(CRLF);
            }
            Reply::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Nil => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::SimpleString(s) => write!(f, "{}", s),
            Reply::Error(message) => write!(f, "(error) {} {}", ERROR_CODE, message),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Nil => write!(f, "(nil)"),
        }
    }
}

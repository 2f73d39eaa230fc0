//! Line Protocol Implementation
//!
//! Requests are plain text lines (`SET foo bar\r\n`), split into
//! space-separated tokens. Replies use a simplified Redis-style encoding.
//!
//! ## Modules
//!
//! - `parser`: Line framing (CRLF, LF-tolerant) and tokenization
//! - `reply`: The `Reply` enum and its wire serialization
//!
//! ## Example
//!
//! ```
//! use blitzdb::protocol::{tokenize, LineParser, Reply};
//! use bytes::{Bytes, BytesMut};
//!
//! let parser = LineParser::default();
//! let mut buf = BytesMut::from(&b"GET name\r\n"[..]);
//! let line = parser.parse(&mut buf).unwrap().unwrap();
//! assert_eq!(tokenize(&line).len(), 2);
//!
//! let reply = Reply::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(reply.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod reply;

// Re-export commonly used types for convenience
pub use parser::{tokenize, LineParser, ParseError, ParseResult, DEFAULT_MAX_LINE_LENGTH};
pub use reply::Reply;

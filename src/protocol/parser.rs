//! Request Line Framing and Tokenization
//!
//! Requests are single lines terminated by CRLF. A bare LF is accepted as
//! well, so clients that only send `\n` (for example `nc` without `-C`) work.
//!
//! ## How the Parser Works
//!
//! The connection keeps a `BytesMut` read buffer. After each read it calls
//! [`LineParser::parse`], which returns:
//! - `Ok(Some(line))` - one complete line, delimiter removed, split off the buffer
//! - `Ok(None)` - no delimiter yet, read more data
//! - `Err(ParseError)` - the pending line exceeds the configured limit
//!
//! Lines are split off the buffer without copying; tokens are slices of the
//! line unless a token carries stray CR/LF bytes that need removing.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Default upper bound for a single request line (64 KB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while framing request lines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// No delimiter within the allowed line length
    #[error("request line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Splits delimited request lines off a read buffer.
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LineParser {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Attempts to take one complete line from the front of `buf`.
    ///
    /// The returned line has its trailing `\n` and, if present, the `\r`
    /// before it removed. Empty lines are returned as empty `Bytes`; deciding
    /// what to do with them is up to the caller.
    pub fn parse(&self, buf: &mut BytesMut) -> ParseResult<Option<Bytes>> {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => {
                // A trailing `\r` may be the first half of a split CRLF
                let pending = buf.len() - usize::from(buf.last() == Some(&b'\r'));
                if pending > self.max_line_length {
                    return Err(ParseError::LineTooLong {
                        size: pending,
                        max: self.max_line_length,
                    });
                }
                return Ok(None);
            }
        };

        let len = if newline > 0 && buf[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };

        if len > self.max_line_length {
            return Err(ParseError::LineTooLong {
                size: len,
                max: self.max_line_length,
            });
        }

        let mut line = buf.split_to(newline + 1);
        line.truncate(len);

        Ok(Some(line.freeze()))
    }
}

/// Splits a request line into tokens.
///
/// Tokens are separated by spaces; runs of spaces never produce empty tokens.
/// Any `\r` or `\n` left inside a token (a malformed line ending, for
/// instance) is removed, and a token that consisted only of such bytes is
/// dropped.
pub fn tokenize(line: &Bytes) -> Vec<Bytes> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for end in line
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b' ')
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
    {
        if end > start {
            if let Some(token) = clean_token(line.slice(start..end)) {
                tokens.push(token);
            }
        }
        start = end + 1;
    }

    tokens
}

fn clean_token(token: Bytes) -> Option<Bytes> {
    let is_stray = |b: &u8| *b == b'\r' || *b == b'\n';

    if !token.iter().any(is_stray) {
        return Some(token);
    }

    let cleaned: Vec<u8> = token.iter().copied().filter(|b| !is_stray(b)).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(Bytes::from(cleaned))
    }
}

//! RESP reply types and encoding.
//!
//! driftkv accepts only arrays of bulk strings on the wire, but answers with
//! three RESP types:
//!
//! - Null: `_\r\n` - acknowledgement of `SET`, `LPUSH`, `RPUSH`
//! - Bulk string: `$<length>\r\n<data>\r\n` - results of `GET`, `LPOP`,
//!   `RPOP`, `LINDEX`
//! - Simple error: `-<message>\r\n` - any failure
//!
//! All length integers are ASCII decimal; bulk bodies are 8-bit clean.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout RESP.
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefix bytes.
pub mod prefix {
    pub const ARRAY: u8 = b'*';
    pub const BULK_STRING: u8 = b'$';
    pub const ERROR: u8 = b'-';
    pub const NULL: u8 = b'_';
}

/// A reply to be serialized onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The RESP3 null, `_\r\n`. Sent to acknowledge writes.
    Null,

    /// A binary-safe, length-prefixed string: `$<length>\r\n<data>\r\n`.
    Bulk(Bytes),

    /// A simple error: `-<message>\r\n`. The message must not contain CRLF.
    Error(String),
}

impl Reply {
    /// Creates a bulk string reply.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// Creates an error reply.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Serializes the reply to a fresh byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// Replies within one command batch share a buffer and reach the socket
    /// in a single write.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Null => {
                buf.push(prefix::NULL);
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(message) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Null => write!(f, "(nil)"),
            Reply::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Error(message) => write!(f, "(error) {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_serializes_to_resp3_null() {
        assert_eq!(Reply::Null.serialize(), b"_\r\n");
    }

    #[test]
    fn bulk_serializes_with_length_prefix() {
        let reply = Reply::bulk(Bytes::from("crayoli"));
        assert_eq!(reply.serialize(), b"$7\r\ncrayoli\r\n");
    }

    #[test]
    fn empty_bulk_serializes() {
        let reply = Reply::bulk(Bytes::new());
        assert_eq!(reply.serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn error_serializes_with_dash_prefix() {
        let reply = Reply::error("Call exceeded size allowed");
        assert_eq!(reply.serialize(), b"-Call exceeded size allowed\r\n");
    }

    #[test]
    fn binary_bulk_is_eight_bit_clean() {
        let reply = Reply::bulk(Bytes::from(&b"he\x00llo"[..]));
        assert_eq!(reply.serialize(), b"$6\r\nhe\x00llo\r\n");
    }

    #[test]
    fn serialize_into_concatenates_a_batch() {
        let mut buf = Vec::new();
        Reply::Null.serialize_into(&mut buf);
        Reply::bulk(Bytes::from("crayoli")).serialize_into(&mut buf);
        assert_eq!(buf, b"_\r\n$7\r\ncrayoli\r\n");
    }
}

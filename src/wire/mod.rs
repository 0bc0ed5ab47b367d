//! Wire protocol implementation.
//!
//! Everything that crosses the network lives here: the binary document
//! codec, the frame layer that carries encoded documents with a correlation
//! id, and the command/reply message vocabulary.
//!
//! # Document format
//!
//! A document encodes as a little-endian `i32` total length, a sequence of
//! elements (type tag byte, NUL-terminated field name, value payload), and
//! a `0x00` terminator. Field insertion order is preserved. Arrays encode
//! as documents keyed `"0"`, `"1"`, ... The 12-byte identifier encodes as
//! fixed-width raw bytes so its generation-time ordering survives the trip.
//!
//! # Frame format
//!
//! Each frame is a 4-byte little-endian length prefix (counting the rest of
//! the frame), a 4-byte correlation id, a 4-byte opcode, and one encoded
//! document as the payload. Responses carry the correlation id of the
//! request they answer.
//!
//! # Submodules
//!
//! - [`marker`] - Element type tag constants
//! - [`encoder`] / [`decoder`] - Document serialization
//! - [`frame`] - Tokio codec for async framing
//! - [`message`] - Command and reply types
//! - [`error`] - Wire-level error type
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the wire protocol directly.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod marker;
pub mod message;

pub use decoder::{decode_document, DocumentDecoder};
pub use encoder::{encode_document, DocumentEncoder};
pub use error::WireError;
pub use frame::{Frame, FrameCodec, OP_COMMAND, OP_REPLY};
pub use message::{Command, Reply, WriteErrorDetail};

use std::fmt;

/// Maximum nesting depth accepted by the encoder and decoder.
pub const MAX_DOCUMENT_DEPTH: usize = 32;

/// Document encoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Nesting exceeds the depth limit
    DepthExceeded {
        /// The configured limit
        limit: usize,
    },
    /// Field name contains a NUL byte
    KeyContainsNul(String),
    /// Value too large for its length prefix
    ValueTooLarge(&'static str, usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::DepthExceeded { limit } => {
                write!(f, "document nesting exceeds depth limit {}", limit)
            }
            EncodeError::KeyContainsNul(key) => {
                write!(f, "field name contains NUL byte: {:?}", key)
            }
            EncodeError::ValueTooLarge(what, size) => {
                write!(f, "{} too large: {} bytes", what, size)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Document decoding errors, always located by byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Byte offset at which decoding failed
    pub offset: usize,
    /// What went wrong
    pub kind: DecodeErrorKind,
}

/// The kinds of decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Input ended before the value did
    UnexpectedEof,
    /// Unknown element type tag
    UnknownElementType(u8),
    /// Invalid UTF-8 in a string or field name
    InvalidUtf8,
    /// Length prefix inconsistent with the data
    BadLength(i64),
    /// String payload not NUL terminated
    MissingTerminator,
    /// Nesting exceeds the depth limit
    DepthExceeded {
        /// The configured limit
        limit: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode error at byte {}: ", self.offset)?;
        match &self.kind {
            DecodeErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeErrorKind::UnknownElementType(tag) => {
                write!(f, "unknown element type 0x{:02X}", tag)
            }
            DecodeErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8"),
            DecodeErrorKind::BadLength(len) => write!(f, "inconsistent length {}", len),
            DecodeErrorKind::MissingTerminator => write!(f, "missing string terminator"),
            DecodeErrorKind::DepthExceeded { limit } => {
                write!(f, "nesting exceeds depth limit {}", limit)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

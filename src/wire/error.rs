//! Wire protocol error types.

use std::fmt;
use std::io;

use super::{DecodeError, EncodeError};

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Wire protocol errors.
#[derive(Debug)]
pub enum WireError {
    /// I/O error
    Io(io::Error),

    /// Document encoding error
    Encode(EncodeError),

    /// Document decoding error
    Decode(DecodeError),

    /// Frame exceeds the maximum size
    FrameTooLarge {
        /// Declared frame size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Unknown frame opcode
    UnknownOpcode(u32),

    /// Reply document missing required fields
    InvalidReply(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Io(e) => write!(f, "I/O error: {}", e),
            WireError::Encode(e) => write!(f, "encode error: {}", e),
            WireError::Decode(e) => write!(f, "{}", e),
            WireError::FrameTooLarge { size, max } => {
                write!(f, "frame too large: {} bytes (max: {})", size, max)
            }
            WireError::UnknownOpcode(op) => write!(f, "unknown opcode: 0x{:08X}", op),
            WireError::InvalidReply(msg) => write!(f, "invalid reply: {}", msg),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Io(e) => Some(e),
            WireError::Encode(e) => Some(e),
            WireError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        WireError::Io(err)
    }
}

impl From<EncodeError> for WireError {
    fn from(err: EncodeError) -> Self {
        WireError::Encode(err)
    }
}

impl From<DecodeError> for WireError {
    fn from(err: DecodeError) -> Self {
        WireError::Decode(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DecodeErrorKind;

    #[test]
    fn test_wire_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: WireError = io_err.into();
        assert!(matches!(err, WireError::Io(_)));
    }

    #[test]
    fn test_wire_error_from_decode() {
        let decode_err = DecodeError {
            offset: 3,
            kind: DecodeErrorKind::UnexpectedEof,
        };
        let err: WireError = decode_err.into();
        assert!(err.to_string().contains("byte 3"));
    }

    #[test]
    fn test_frame_too_large_display() {
        let err = WireError::FrameTooLarge {
            size: 200,
            max: 100,
        };
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("100"));
    }
}

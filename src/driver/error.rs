//! Driver error types.

use std::io;

use thiserror::Error;

use crate::wire::{DecodeError, EncodeError, WireError};

/// Driver errors.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Server unreachable, connection refused, or connect deadline exceeded
    #[error("connection error: {0}")]
    Connect(String),

    /// Operation deadline exceeded; the connection is discarded
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// No pool slot became available within the deadline
    #[error("pool acquire timed out: {0}")]
    PoolTimeout(String),

    /// Malformed request shape, caught before any network call
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Server rejected a write
    #[error("write error: {code} - {message}")]
    Write {
        /// Server error code
        code: i32,
        /// Server error message
        message: String,
    },

    /// Server rejected a non-write command
    #[error("server error: {code} - {message}")]
    Server {
        /// Server error code
        code: i32,
        /// Server error message
        message: String,
    },

    /// In-flight request orphaned by a closed connection
    #[error("connection closed")]
    ConnectionClosed,

    /// Document encoding error
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Document decoding error
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// Wire protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Pool unusable (closed, semaphore gone)
    #[error("pool error: {0}")]
    Pool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    /// Connection error.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Pool acquire timeout error.
    pub fn pool_timeout(msg: impl Into<String>) -> Self {
        Self::PoolTimeout(msg.into())
    }

    /// Invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Write error.
    pub fn write(code: i32, message: impl Into<String>) -> Self {
        Self::Write {
            code,
            message: message.into(),
        }
    }

    /// Server error.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Pool error.
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// Whether the failure was produced without consuming a connection.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Configuration(_) | Self::Encode(_)
        )
    }
}

impl From<WireError> for DriverError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(e) => DriverError::Io(e),
            WireError::Encode(e) => DriverError::Encode(e),
            WireError::Decode(e) => DriverError::Decode(e),
            WireError::FrameTooLarge { size, max } => {
                DriverError::Protocol(format!("frame too large: {} bytes (max: {})", size, max))
            }
            WireError::UnknownOpcode(op) => {
                DriverError::Protocol(format!("unknown opcode: 0x{:08X}", op))
            }
            WireError::InvalidReply(msg) => DriverError::Protocol(msg),
        }
    }
}

/// Driver result type.
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DecodeErrorKind;

    #[test]
    fn test_error_creation() {
        assert!(matches!(
            DriverError::connect("refused"),
            DriverError::Connect(_)
        ));
        assert!(matches!(
            DriverError::pool_timeout("saturated"),
            DriverError::PoolTimeout(_)
        ));
        assert!(matches!(
            DriverError::write(11000, "duplicate key"),
            DriverError::Write { code: 11000, .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = DriverError::connect("connection refused");
        assert_eq!(err.to_string(), "connection error: connection refused");

        let err = DriverError::write(11000, "duplicate key");
        assert_eq!(err.to_string(), "write error: 11000 - duplicate key");

        let err = DriverError::Decode(DecodeError {
            offset: 9,
            kind: DecodeErrorKind::UnexpectedEof,
        });
        assert!(err.to_string().contains("byte 9"));
    }

    #[test]
    fn test_is_client_error() {
        assert!(DriverError::invalid_argument("bad projection").is_client_error());
        assert!(DriverError::configuration("bad port").is_client_error());
        assert!(!DriverError::connect("refused").is_client_error());
        assert!(!DriverError::ConnectionClosed.is_client_error());
    }

    #[test]
    fn test_from_wire_error() {
        let err: DriverError = WireError::UnknownOpcode(9).into();
        assert!(matches!(err, DriverError::Protocol(_)));

        let err: DriverError = WireError::InvalidReply("missing ok".into()).into();
        assert!(matches!(err, DriverError::Protocol(_)));
    }
}

//! Error types
//!
//! Administrative failures are reported back to the requesting client as a
//! `BoxAnswer`; session failures end only the session that hit them. Only a
//! dispatcher failure is fatal to the daemon.

use std::io;

use thiserror::Error as ThisError;

use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level broker error
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed or oversized record
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Box lookup, creation, removal or attachment failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// I/O failure on a client-facing channel
    #[error("channel error: {0}")]
    Channel(#[from] io::Error),

    /// The request queue is shutting down
    #[error("request queue closed")]
    QueueClosed,

    /// Rejected configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True when the peer went away (broken pipe, EOF, reset).
    ///
    /// Sessions end quietly on these instead of logging a failure.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Channel(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}

/// Wire protocol errors
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ProtocolError {
    /// Op code outside the known table
    #[error("unknown op code {0}")]
    UnknownOpCode(u8),

    /// Op code valid on the wire but not where it was received
    #[error("unexpected op code {actual} (expected {expected})")]
    UnexpectedOpCode { expected: &'static str, actual: u8 },

    /// String does not fit its fixed-capacity field (NUL included)
    #[error("{field} is {len} bytes, capacity is {capacity}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        capacity: usize,
    },

    /// Fixed-capacity field with no NUL terminator
    #[error("{field} is not NUL terminated")]
    Unterminated { field: &'static str },

    /// Embedded NUL in a string being encoded
    #[error("{field} contains a NUL byte")]
    EmbeddedNul { field: &'static str },

    /// Field bytes are not UTF-8
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// Required field left empty
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// Stream ended part way through a record
    #[error("truncated record: got {got} of {expected} bytes")]
    Truncated { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        let broken = Error::Channel(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(broken.is_disconnect());

        let other = Error::Channel(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!other.is_disconnect());

        assert!(!Error::QueueClosed.is_disconnect());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::FieldTooLong {
            field: "box name",
            len: 40,
            capacity: 32,
        };
        assert_eq!(err.to_string(), "box name is 40 bytes, capacity is 32");
    }
}

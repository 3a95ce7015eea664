//! Transport layer error types.
//!
//! These describe failures of the HTTP/3 collaborator behind the
//! `Connector` / `PeerConnection` seam.

use std::io;

use thiserror::Error;

use crate::core::{
    CONNECTION_LOST_ERROR, HANDSHAKE_FAILED_ERROR, HANDSHAKE_TIMEOUT_ERROR, NO_ERROR, UNKNOWN_ERROR,
};

/// Transport layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered the extended CONNECT with a non-2xx status.
    #[error("handshake rejected with status {status}")]
    HandshakeRejected {
        /// HTTP status code.
        status: u16,
    },

    /// The handshake did not finish in time.
    #[error("handshake timeout")]
    HandshakeTimeout,

    /// The underlying connection went away.
    #[error("connection lost")]
    ConnectionLost,

    /// The peer refused to open a stream.
    #[error("stream refused: {0}")]
    StreamRefused(String),

    /// The peer connection has no stream with this id, e.g. a send or
    /// finish for a stream it never opened.
    #[error("unknown stream {0}")]
    UnknownStream(u64),

    /// I/O failure, flattened to a message. During the handshake this is a
    /// socket or TLS failure before any HTTP status arrived.
    #[error("i/o error: {0}")]
    Io(String),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl TransportError {
    /// Check if this error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::HandshakeRejected { .. }
                | TransportError::HandshakeTimeout
                | TransportError::ConnectionLost
                | TransportError::Closed
        )
    }

    /// Close code reported through `on_session_closed` when this error
    /// terminates a session.
    pub fn close_code(&self) -> u32 {
        match self {
            TransportError::HandshakeRejected { status } => u32::from(*status),
            TransportError::HandshakeTimeout => HANDSHAKE_TIMEOUT_ERROR,
            TransportError::ConnectionLost => CONNECTION_LOST_ERROR,
            TransportError::Io(_) => HANDSHAKE_FAILED_ERROR,
            TransportError::Closed => NO_ERROR,
            TransportError::StreamRefused(_) | TransportError::UnknownStream(_) => UNKNOWN_ERROR,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(TransportError::HandshakeRejected { status: 404 }.is_fatal());
        assert!(TransportError::HandshakeTimeout.is_fatal());
        assert!(TransportError::ConnectionLost.is_fatal());
        assert!(TransportError::Closed.is_fatal());

        assert!(!TransportError::StreamRefused("limit".into()).is_fatal());
        assert!(!TransportError::UnknownStream(4).is_fatal());
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(TransportError::HandshakeRejected { status: 404 }.close_code(), 404);
        assert_eq!(TransportError::HandshakeTimeout.close_code(), HANDSHAKE_TIMEOUT_ERROR);
        assert_eq!(TransportError::ConnectionLost.close_code(), CONNECTION_LOST_ERROR);
    }

    #[test]
    fn test_from_io() {
        let err: TransportError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!(err, TransportError::Io("boom".into()));
    }
}

//! Error types for sessions and streams.

use thiserror::Error;

use super::constants::{INVALID_STATE_ERROR, UNKNOWN_ERROR};
use crate::transport::SessionPhase;
use crate::transport::TransportError;

/// Stream-level failures.
///
/// Delivered to `StreamCallback::on_error` and
/// `SendStreamStatsCallback::on_stats_error`, or returned by `write`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Stream requested before the session was Ready, or after it closed.
    #[error("session is not ready")]
    InvalidState,

    /// The peer refused or failed to open the stream.
    #[error("stream creation failed (code {code}): {reason}")]
    StreamCreation {
        /// Transport-level code.
        code: u32,
        /// Human-readable cause.
        reason: String,
    },

    /// Write or close on a stream that has already been closed.
    #[error("stream closed")]
    StreamClosed,

    /// Statistics requested for a released stream.
    #[error("stream statistics unavailable")]
    StatsUnavailable,

    /// The owning session closed while the stream was mid-transfer.
    #[error("session closed")]
    SessionClosed,
}

impl StreamError {
    /// Numeric code as seen by listeners.
    pub fn code(&self) -> u32 {
        match self {
            StreamError::InvalidState => INVALID_STATE_ERROR,
            StreamError::StreamCreation { code, .. } => *code,
            StreamError::StreamClosed
            | StreamError::StatsUnavailable
            | StreamError::SessionClosed => UNKNOWN_ERROR,
        }
    }
}

/// Errors returned synchronously by the public API.
///
/// Everything else is reported to listeners.
#[derive(Debug, Error)]
pub enum WebTransportError {
    /// The endpoint URI could not be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A call argument was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session is in the wrong phase for this call.
    #[error("invalid state: session is {0:?}")]
    InvalidState(SessionPhase),

    /// No tokio runtime was available at construction time.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// The session driver is gone.
    #[error("session driver is gone")]
    SessionGone,

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result alias for the public API.
pub type Result<T> = std::result::Result<T, WebTransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_codes() {
        assert_eq!(StreamError::InvalidState.code(), INVALID_STATE_ERROR);
        assert_eq!(StreamError::StreamClosed.code(), UNKNOWN_ERROR);
        assert_eq!(
            StreamError::StreamCreation {
                code: 7,
                reason: "refused".into(),
            }
            .code(),
            7
        );
    }

    #[test]
    fn test_error_display() {
        let err = WebTransportError::InvalidState(SessionPhase::Closed);
        assert_eq!(err.to_string(), "invalid state: session is Closed");

        let err: WebTransportError = StreamError::StatsUnavailable.into();
        assert_eq!(err.to_string(), "stream error: stream statistics unavailable");
    }
}

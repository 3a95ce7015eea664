//! Listener interfaces.
//!
//! Callbacks always run on the session's dispatch task, never inside the
//! call that triggered them. The traits are also implemented for unbounded
//! mpsc senders so callers can consume events as channel messages.

use tokio::sync::mpsc;

use super::stream::{BidirectionalStream, SendStream};
use crate::core::{SendStreamStats, SessionId, StreamError};

/// Receives the outcome of `async_connect` and the final close.
pub trait SessionEventListener: Send + Sync + 'static {
    /// The handshake succeeded.
    fn on_session_ready(&self, session_id: SessionId);

    /// The session reached its terminal state. Called at most once.
    fn on_session_closed(&self, error_code: u32, reason: &str);
}

/// Receives the outcome of one stream-creation request.
///
/// Exactly one method is called per request.
pub trait StreamCallback: Send + 'static {
    /// A bidirectional stream is open.
    fn on_bidirectional_stream_ready(&self, stream: BidirectionalStream);

    /// A unidirectional stream is open.
    fn on_unidirectional_stream_ready(&self, stream: SendStream);

    /// The stream could not be created.
    fn on_error(&self, error: StreamError);
}

/// Receives one statistics snapshot.
pub trait SendStreamStatsCallback: Send + 'static {
    /// Counters as of the request.
    fn on_stats_available(&self, stats: SendStreamStats);

    /// The stream was already released.
    fn on_stats_error(&self, error: StreamError);
}

/// Session listener callbacks as a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `on_session_ready`.
    Ready(SessionId),
    /// `on_session_closed`.
    Closed {
        /// Close code.
        error_code: u32,
        /// Close reason.
        reason: String,
    },
}

/// Stream callbacks as a message.
#[derive(Debug)]
pub enum StreamEvent {
    /// `on_bidirectional_stream_ready`.
    Bidirectional(BidirectionalStream),
    /// `on_unidirectional_stream_ready`.
    Unidirectional(SendStream),
    /// `on_error`.
    Error(StreamError),
}

impl StreamEvent {
    /// The unidirectional stream, if that is what arrived.
    pub fn into_unidirectional(self) -> Option<SendStream> {
        match self {
            StreamEvent::Unidirectional(stream) => Some(stream),
            _ => None,
        }
    }

    /// The bidirectional stream, if that is what arrived.
    pub fn into_bidirectional(self) -> Option<BidirectionalStream> {
        match self {
            StreamEvent::Bidirectional(stream) => Some(stream),
            _ => None,
        }
    }

    /// The error, if creation failed.
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            StreamEvent::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Stats callbacks as a message.
pub type StatsEvent = Result<SendStreamStats, StreamError>;

// A dropped receiver means nobody is waiting any more; the event is discarded.

impl SessionEventListener for mpsc::UnboundedSender<SessionEvent> {
    fn on_session_ready(&self, session_id: SessionId) {
        let _ = self.send(SessionEvent::Ready(session_id));
    }

    fn on_session_closed(&self, error_code: u32, reason: &str) {
        let _ = self.send(SessionEvent::Closed {
            error_code,
            reason: reason.to_string(),
        });
    }
}

impl StreamCallback for mpsc::UnboundedSender<StreamEvent> {
    fn on_bidirectional_stream_ready(&self, stream: BidirectionalStream) {
        let _ = self.send(StreamEvent::Bidirectional(stream));
    }

    fn on_unidirectional_stream_ready(&self, stream: SendStream) {
        let _ = self.send(StreamEvent::Unidirectional(stream));
    }

    fn on_error(&self, error: StreamError) {
        let _ = self.send(StreamEvent::Error(error));
    }
}

impl SendStreamStatsCallback for mpsc::UnboundedSender<StatsEvent> {
    fn on_stats_available(&self, stats: SendStreamStats) {
        let _ = self.send(Ok(stats));
    }

    fn on_stats_error(&self, error: StreamError) {
        let _ = self.send(Err(error));
    }
}

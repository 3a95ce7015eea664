//! Seam to the HTTP/3 engine.
//!
//! A [`Connector`] performs the extended CONNECT handshake and yields a
//! [`PeerConnection`] plus a channel of [`PeerEvent`]s. The session driver
//! is the only user of both.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::endpoint::Endpoint;
use super::error::TransportResult;
use crate::core::{SecurityFlags, StreamDirection, StreamId};

/// Parameters of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Target endpoint.
    pub endpoint: Endpoint,
    /// `Origin` header, absent for a system principal.
    pub origin: Option<String>,
    /// Caller's security flags.
    pub security_flags: SecurityFlags,
}

/// Events raised by the peer after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Bytes arrived on a bidirectional stream.
    StreamData {
        /// Stream the bytes belong to.
        stream_id: StreamId,
        /// Payload.
        data: Bytes,
    },

    /// The peer closed the session.
    SessionClosed {
        /// Application close code.
        error_code: u32,
        /// Close reason.
        reason: String,
    },
}

/// Result of an accepted handshake.
pub struct Established {
    /// The live connection.
    pub connection: Box<dyn PeerConnection>,
    /// Peer events. The channel closing means the connection dropped.
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
}

impl std::fmt::Debug for Established {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Established").finish_non_exhaustive()
    }
}

/// Performs session handshakes.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Run the handshake. A rejection is reported as
    /// `TransportError::HandshakeRejected`.
    async fn connect(&self, request: ConnectRequest) -> TransportResult<Established>;
}

/// One established session on the peer side.
#[async_trait]
pub trait PeerConnection: Send + Sync + 'static {
    /// Open an outgoing stream.
    async fn open_stream(&self, direction: StreamDirection) -> TransportResult<StreamId>;

    /// Transmit bytes on a stream.
    async fn send(&self, stream_id: StreamId, data: Bytes) -> TransportResult<()>;

    /// Signal that no more bytes follow on a stream.
    async fn finish_stream(&self, stream_id: StreamId) -> TransportResult<()>;

    /// Close the session with a code and reason.
    async fn close(&self, error_code: u32, reason: &str);
}

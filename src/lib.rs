//! # webtransport-session
//!
//! Client-side session and stream multiplexing modelled on WebTransport over
//! HTTP/3. A session is opened with an extended CONNECT handshake to an
//! `https` endpoint; once Ready it carries outgoing unidirectional and
//! bidirectional streams. It provides:
//!
//! - **Lifecycle**: Idle → Connecting → Ready → Closed, with a bounded
//!   handshake and exactly one terminal notification
//! - **Streams**: buffered writes, paced sends, per-stream statistics
//! - **Listeners**: callbacks delivered in causal order on a per-session
//!   dispatch task, never on the caller's stack
//! - **Registry**: Ready sessions addressable by id
//!
//! The HTTP/3 engine sits behind the [`transport::Connector`] trait. The
//! `loopback` feature (default) ships an in-process peer for tests and demos.
//!
//! ## Feature Flags
//!
//! - `loopback` (default): [`transport::LoopbackConnector`]
//!
//! ## Modules
//!
//! - [`core`]: ids, stream types, constants, and error types
//! - [`transport`]: endpoint parsing, session state machine, pacing, connector seam
//! - [`session`]: manager, session and stream handles, listeners
//!
//! ## Example Usage
//!
//! ```rust
//! use webtransport_session::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let manager = TransportManager::new(SessionConfig::default(), LoopbackConnector::new())?;
//! let session = manager.new_transport_session();
//!
//! let (events_tx, mut events) = mpsc::unbounded_channel::<SessionEvent>();
//! session.async_connect(
//!     "https://example.com:4433/success",
//!     Principal::System,
//!     SecurityFlags::NONE,
//!     events_tx,
//! )?;
//! assert!(matches!(events.recv().await, Some(SessionEvent::Ready(_))));
//!
//! let (streams_tx, mut streams) = mpsc::unbounded_channel::<StreamEvent>();
//! session.create_outgoing_unidirectional_stream(streams_tx);
//! let stream = streams.recv().await.and_then(StreamEvent::into_unidirectional).unwrap();
//! stream.write(b"123456", 6)?;
//!
//! session.close_session(0, "done");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer
pub mod transport;

// Session API
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types, constants, and errors
    pub use crate::core::*;

    pub use crate::transport::{
        CloseInfo, CloseInitiator, ConnectRequest, Connector, Endpoint, Established,
        PeerConnection, PeerEvent, SessionPhase, TransportError, TransportResult,
    };

    #[cfg(feature = "loopback")]
    pub use crate::transport::LoopbackConnector;

    pub use crate::session::*;
}

// Re-export commonly used items at crate root
pub use crate::core::{Result, SessionId, StreamError, StreamId, WebTransportError};

pub use crate::session::{
    BidirectionalStream, SendStream, Session, SessionConfig, SessionConfigBuilder,
    TransportManager,
};

pub use crate::transport::{Connector, SessionPhase};

//! Transport layer.
//!
//! Everything the session layer needs from below:
//!
//! - **Endpoint parsing**: [`Endpoint`]
//! - **Session state machine**: [`SessionState`], [`SessionPhase`]
//! - **Send pacing**: [`SendPacer`]
//! - **HTTP/3 seam**: [`Connector`] and [`PeerConnection`]
//! - **Loopback peer**: [`LoopbackConnector`] (feature `loopback`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Session layer (handles, driver)     │
//! ├─────────────────────────────────────────┤
//! │         Transport layer                 │  ← This module
//! │   endpoint, phases, pacing, connector   │
//! ├─────────────────────────────────────────┤
//! │     HTTP/3 engine (external)            │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
mod connector;
mod endpoint;
mod error;
#[cfg(feature = "loopback")]
mod loopback;
mod pacing;

pub use connection::*;
pub use connector::*;
pub use endpoint::Endpoint;
pub use error::*;
#[cfg(feature = "loopback")]
pub use loopback::{LoopbackConnector, LoopbackRecord, REJECT_STATUS};
pub use pacing::{PacerAction, SendPacer, constants as pacing_constants};

//! Session layer.
//!
//! - [`TransportManager`]: creates sessions, tracks the Ready ones
//! - [`Session`]: connect, close, create streams
//! - [`SendStream`] / [`BidirectionalStream`]: write, read, stats, close
//! - Listener traits, with channel adapters ([`SessionEvent`],
//!   [`StreamEvent`], [`StatsEvent`])
//!
//! Each session runs two tasks: a driver owning the peer connection and a
//! dispatcher delivering listener callbacks in order.

mod config;
mod dispatch;
mod driver;
mod listener;
mod manager;
mod registry;
#[allow(clippy::module_inception)]
mod session;
mod stream;


pub use config::{SessionConfig, SessionConfigBuilder};
pub use listener::{
    SendStreamStatsCallback, SessionEvent, SessionEventListener, StatsEvent, StreamCallback,
    StreamEvent,
};
pub use manager::TransportManager;
pub use registry::SessionRegistry;
pub use session::Session;
pub use stream::{BidirectionalStream, SendStream};

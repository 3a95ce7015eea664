//! Session handle.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use super::config::SessionConfig;
use super::dispatch::Dispatcher;
use super::driver::{Command, SessionDriver};
use super::listener::{SessionEventListener, StreamCallback};
use super::registry::SessionRegistry;
use super::stream::StreamTable;
use crate::core::{
    Principal, Result, SecurityFlags, SessionId, StreamDirection, StreamError, WebTransportError,
};
use crate::transport::{
    CloseInfo, CloseInitiator, ConnectRequest, Connector, Endpoint, SessionPhase, SessionState,
};

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: Arc<Mutex<SessionState>>,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) streams: Arc<StreamTable>,
}

/// One WebTransport session.
///
/// Cloning yields another handle to the same session. All methods return
/// immediately; outcomes arrive on the listeners.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Spawn the driver and dispatch tasks of a new Idle session.
    pub(crate) fn spawn(
        runtime: &Handle,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        registry: SessionRegistry,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            state: Arc::new(Mutex::new(SessionState::new())),
            commands,
            dispatcher: Dispatcher::spawn(runtime),
            streams: Arc::new(StreamTable::default()),
        });

        let driver = SessionDriver::new(&inner, commands_rx, registry, connector, config);
        runtime.spawn(driver.run());

        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// Start the handshake with `uri`.
    ///
    /// Fails synchronously if the URI is malformed or the session is not
    /// Idle. Otherwise `listener` later receives either `on_session_ready`
    /// or `on_session_closed`.
    pub fn async_connect(
        &self,
        uri: &str,
        principal: Principal,
        security_flags: SecurityFlags,
        listener: impl SessionEventListener,
    ) -> Result<()> {
        let endpoint = Endpoint::parse(uri)?;
        let request = ConnectRequest {
            endpoint: endpoint.clone(),
            origin: principal.origin().map(str::to_string),
            security_flags,
        };

        self.inner.state.lock().begin_connect(endpoint)?;
        debug!(uri, "connect requested");

        self.inner
            .commands
            .send(Command::Connect {
                request,
                listener: Arc::new(listener),
            })
            .map_err(|_| WebTransportError::SessionGone)
    }

    /// Close the session. Idempotent.
    ///
    /// The reason is truncated to 1024 bytes. A Connecting or Ready session
    /// reports `on_session_closed(error_code, reason)` to its listener; an
    /// Idle session just becomes Closed. Streams are released before this
    /// returns, so later writes fail with `SessionClosed`.
    pub fn close_session(&self, error_code: u32, reason: &str) {
        let info = CloseInfo::new(error_code, reason, CloseInitiator::Local);
        {
            let mut state = self.inner.state.lock();
            let info = (state.phase != SessionPhase::Idle).then(|| info.clone());
            if !state.close(info) {
                return;
            }
        }
        self.inner.streams.release_all();
        debug!(error_code, "close requested");
        let _ = self.inner.commands.send(Command::Close {
            error_code: info.error_code,
            reason: info.reason,
        });
    }

    /// Request an outgoing bidirectional stream.
    pub fn create_outgoing_bidirectional_stream(&self, callback: impl StreamCallback) {
        self.create_stream(StreamDirection::Bidirectional, Box::new(callback));
    }

    /// Request an outgoing unidirectional stream.
    pub fn create_outgoing_unidirectional_stream(&self, callback: impl StreamCallback) {
        self.create_stream(StreamDirection::Unidirectional, Box::new(callback));
    }

    fn create_stream(&self, direction: StreamDirection, callback: Box<dyn StreamCallback>) {
        if !self.phase().accepts_streams() {
            self.inner
                .dispatcher
                .stream_error(callback, StreamError::InvalidState);
            return;
        }

        if let Err(mpsc::error::SendError(command)) = self
            .inner
            .commands
            .send(Command::CreateStream { direction, callback })
            && let Command::CreateStream { callback, .. } = command
        {
            self.inner
                .dispatcher
                .stream_error(callback, StreamError::InvalidState);
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    /// Id assigned when the session became Ready.
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.state.lock().session_id
    }

    /// Endpoint passed to `async_connect`.
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.state.lock().endpoint.clone()
    }

    /// How the session ended, once Closed.
    pub fn close_info(&self) -> Option<CloseInfo> {
        self.inner.state.lock().close.clone()
    }

    /// Snapshot of the full session state.
    pub fn state(&self) -> SessionState {
        self.inner.state.lock().clone()
    }
}

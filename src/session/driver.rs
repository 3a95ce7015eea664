//! Session driver task.
//!
//! One task per session owns the peer connection, the stream table and the
//! send pacer. Handles talk to it through [`Command`]s; everything the
//! listeners must hear goes out through the session's dispatcher.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{Span, debug, info, instrument, warn};

use super::config::SessionConfig;
use super::dispatch::Dispatcher;
use super::listener::{SessionEventListener, StreamCallback};
use super::registry::SessionRegistry;
use super::session::{Session, SessionInner};
use super::stream::{StreamCore, StreamTable};
use crate::core::{
    CONNECTION_LOST_ERROR, NO_ERROR, SessionId, StreamDirection, StreamError, StreamId, StreamState,
    UNKNOWN_ERROR,
};
use crate::transport::{
    CloseInfo, CloseInitiator, ConnectRequest, Connector, Established, PacerAction, PeerConnection,
    PeerEvent, SendPacer, SessionState, TransportError,
};

/// Requests from handles to the driver.
pub(crate) enum Command {
    Connect {
        request: ConnectRequest,
        listener: Arc<dyn SessionEventListener>,
    },
    Close {
        error_code: u32,
        reason: String,
    },
    CreateStream {
        direction: StreamDirection,
        callback: Box<dyn StreamCallback>,
    },
    DataQueued,
    FinishStream(StreamId),
}

pub(crate) struct SessionDriver {
    session: Weak<SessionInner>,
    state: Arc<Mutex<SessionState>>,
    streams: Arc<StreamTable>,
    commands: mpsc::UnboundedReceiver<Command>,
    dispatcher: Dispatcher,
    registry: SessionRegistry,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
}

/// The Ready phase.
struct Active {
    id: SessionId,
    listener: Arc<dyn SessionEventListener>,
    connection: Box<dyn PeerConnection>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    commands_tx: mpsc::UnboundedSender<Command>,
    streams: BTreeMap<StreamId, Arc<StreamCore>>,
    pacer: SendPacer,
}

impl SessionDriver {
    pub(crate) fn new(
        inner: &Arc<SessionInner>,
        commands: mpsc::UnboundedReceiver<Command>,
        registry: SessionRegistry,
        connector: Arc<dyn Connector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            session: Arc::downgrade(inner),
            state: Arc::clone(&inner.state),
            streams: Arc::clone(&inner.streams),
            commands,
            dispatcher: inner.dispatcher.clone(),
            registry,
            connector,
            config,
        }
    }

    pub(crate) async fn run(mut self) {
        match self.await_connect().await {
            Some((request, listener)) => self.connected(request, listener).await,
            None => {
                debug!("session dropped before connect");
                self.drain_commands();
            }
        }
    }

    #[instrument(
        name = "session",
        skip_all,
        fields(endpoint = %request.endpoint, session_id = tracing::field::Empty)
    )]
    async fn connected(mut self, request: ConnectRequest, listener: Arc<dyn SessionEventListener>) {
        let Some(established) = self.handshake(request, &listener).await else {
            return;
        };
        if let Some(mut active) = self.activate(established, listener).await {
            let info = self.serve(&mut active).await;
            self.shutdown(active, info).await;
        }
    }

    /// Idle: wait for `Connect`.
    async fn await_connect(&mut self) -> Option<(ConnectRequest, Arc<dyn SessionEventListener>)> {
        loop {
            match self.commands.recv().await? {
                Command::Connect { request, listener } => return Some((request, listener)),
                Command::Close { .. } => return None,
                Command::CreateStream { callback, .. } => {
                    self.dispatcher.stream_error(callback, StreamError::InvalidState)
                }
                Command::DataQueued | Command::FinishStream(_) => {}
            }
        }
    }

    /// Connecting: run the handshake under the timeout, abortable by `Close`.
    async fn handshake(
        &mut self,
        request: ConnectRequest,
        listener: &Arc<dyn SessionEventListener>,
    ) -> Option<Established> {
        let connector = Arc::clone(&self.connector);
        let connect = tokio::time::timeout(self.config.handshake_timeout, connector.connect(request));
        tokio::pin!(connect);
        let mut handles_alive = true;

        loop {
            tokio::select! {
                result = &mut connect => {
                    let err = match result {
                        Ok(Ok(established)) => return Some(established),
                        Ok(Err(err)) => err,
                        Err(_) => TransportError::HandshakeTimeout,
                    };
                    warn!(error = %err, "handshake failed");
                    let info = CloseInfo::new(err.close_code(), &err.to_string(), CloseInitiator::Transport);
                    self.report_closed(listener, info);
                    return None;
                }
                command = self.commands.recv(), if handles_alive => match command {
                    Some(Command::Close { error_code, reason }) => {
                        let info = CloseInfo::new(error_code, &reason, CloseInitiator::Local);
                        self.report_closed(listener, info);
                        return None;
                    }
                    Some(Command::CreateStream { callback, .. }) => {
                        self.dispatcher.stream_error(callback, StreamError::InvalidState);
                    }
                    Some(_) => {}
                    None => handles_alive = false,
                },
            }
        }
    }

    /// Connecting → Ready. Returns `None` if the session was closed or
    /// dropped while the handshake finished.
    async fn activate(
        &mut self,
        established: Established,
        listener: Arc<dyn SessionEventListener>,
    ) -> Option<Active> {
        let Established { connection, events } = established;

        let Some(inner) = self.session.upgrade() else {
            debug!("all handles dropped during handshake");
            connection.close(NO_ERROR, "").await;
            self.report_closed(&listener, CloseInfo::new(NO_ERROR, "", CloseInitiator::Local));
            return None;
        };

        let id = self.registry.allocate_id();
        if !self.state.lock().complete_handshake(id) {
            let info = self.final_close_info(CloseInfo::new(NO_ERROR, "", CloseInitiator::Local));
            connection.close(info.error_code, &info.reason).await;
            self.drain_commands();
            self.dispatcher.session_closed(listener, info.error_code, info.reason);
            return None;
        }

        let commands_tx = inner.commands.clone();
        self.registry.insert(id, Session::from_inner(inner));
        Span::current().record("session_id", tracing::field::display(id));
        info!("session ready");
        self.dispatcher.session_ready(Arc::clone(&listener), id);

        Some(Active {
            id,
            listener,
            connection,
            events,
            commands_tx,
            streams: BTreeMap::new(),
            pacer: SendPacer::new(self.config.min_send_interval, self.config.collection_interval),
        })
    }

    /// Ready: serve commands, peer events and pacer deadlines until the
    /// session ends.
    async fn serve(&mut self, active: &mut Active) -> CloseInfo {
        loop {
            let deadline = active.pacer.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::CreateStream { direction, callback }) => {
                        if let Some(info) = self.open_stream(active, direction, callback).await {
                            return info;
                        }
                    }
                    Some(Command::DataQueued) => active.pacer.on_data_queued(),
                    Some(Command::FinishStream(stream_id)) => {
                        if active.streams.remove(&stream_id).is_some()
                            && let Err(err) = active.connection.finish_stream(stream_id).await
                        {
                            warn!(%stream_id, error = %err, "finish failed");
                        }
                    }
                    Some(Command::Close { error_code, reason }) => {
                        return CloseInfo::new(error_code, &reason, CloseInitiator::Local);
                    }
                    Some(Command::Connect { .. }) => {}
                    None => return CloseInfo::new(NO_ERROR, "", CloseInitiator::Local),
                },
                event = active.events.recv() => match event {
                    Some(PeerEvent::StreamData { stream_id, data }) => {
                        if let Some(stream) = active.streams.get(&stream_id) {
                            stream.push_inbound(&data);
                        }
                    }
                    Some(PeerEvent::SessionClosed { error_code, reason }) => {
                        return CloseInfo::new(error_code, &reason, CloseInitiator::Peer);
                    }
                    None => {
                        return CloseInfo::new(CONNECTION_LOST_ERROR, "connection lost", CloseInitiator::Transport);
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(info) = self.flush(active).await {
                        return info;
                    }
                }
            }
        }
    }

    async fn open_stream(
        &self,
        active: &mut Active,
        direction: StreamDirection,
        callback: Box<dyn StreamCallback>,
    ) -> Option<CloseInfo> {
        match active.connection.open_stream(direction).await {
            Ok(stream_id) => {
                let core = StreamCore::new(
                    stream_id,
                    direction,
                    active.commands_tx.clone(),
                    self.dispatcher.clone(),
                );
                if !self.streams.track(&core) {
                    // close_session ran while the peer was opening it.
                    self.dispatcher.stream_error(callback, StreamError::InvalidState);
                    return None;
                }
                core.open();
                active.streams.insert(stream_id, Arc::clone(&core));
                debug!(%stream_id, ?direction, "stream open");
                self.dispatcher.stream_ready(callback, core.ready_stream());
                None
            }
            Err(err) => {
                warn!(?direction, error = %err, "stream creation failed");
                let fatal = transport_close(&err);
                self.dispatcher.stream_error(
                    callback,
                    StreamError::StreamCreation {
                        code: UNKNOWN_ERROR,
                        reason: err.to_string(),
                    },
                );
                fatal
            }
        }
    }

    /// One paced send round: at most one chunk per stream.
    async fn flush(&self, active: &mut Active) -> Option<CloseInfo> {
        if active.pacer.poll() != PacerAction::SendNow {
            return None;
        }

        let mut more_pending = false;
        let mut failed = Vec::new();

        for (stream_id, stream) in &active.streams {
            let Some(chunk) = stream.take_chunk(self.config.max_chunk_size) else {
                continue;
            };
            let len = chunk.len();
            match active.connection.send(*stream_id, chunk).await {
                Ok(()) => stream.on_chunk_sent(len),
                Err(err) => {
                    warn!(%stream_id, error = %err, "send failed");
                    stream.fail();
                    failed.push(*stream_id);
                    if let Some(info) = transport_close(&err) {
                        return Some(info);
                    }
                    continue;
                }
            }
            more_pending |= stream.has_outbound();
        }

        for stream_id in failed {
            active.streams.remove(&stream_id);
        }
        active.pacer.on_sent(more_pending);
        None
    }

    /// Ready → Closed.
    async fn shutdown(mut self, mut active: Active, info: CloseInfo) {
        let info = self.final_close_info(info);

        active.pacer.clear();
        self.streams.release_all();
        let mut errored = 0usize;
        for stream in active.streams.values() {
            if stream.release() == StreamState::Errored {
                errored += 1;
            }
        }
        active.streams.clear();

        if info.initiator == CloseInitiator::Local {
            active.connection.close(info.error_code, &info.reason).await;
        }
        self.registry.remove(active.id);
        self.drain_commands();

        info!(
            session_id = %active.id,
            error_code = info.error_code,
            initiator = ?info.initiator,
            errored_streams = errored,
            "session closed"
        );
        self.dispatcher
            .session_closed(active.listener, info.error_code, info.reason);
    }

    /// Mark the shared state Closed. A close recorded earlier by a handle
    /// wins over `info`.
    fn final_close_info(&self, info: CloseInfo) -> CloseInfo {
        let mut state = self.state.lock();
        state.close(Some(info.clone()));
        state.close.clone().unwrap_or(info)
    }

    /// Connecting → Closed.
    fn report_closed(&mut self, listener: &Arc<dyn SessionEventListener>, info: CloseInfo) {
        let info = self.final_close_info(info);
        self.drain_commands();
        self.dispatcher
            .session_closed(Arc::clone(listener), info.error_code, info.reason);
    }

    /// Refuse everything still queued. Called once the driver stops serving.
    fn drain_commands(&mut self) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::CreateStream { callback, .. } = command {
                self.dispatcher.stream_error(callback, StreamError::InvalidState);
            }
        }
    }
}

/// Map a connection-level failure to the close it causes.
fn transport_close(err: &TransportError) -> Option<CloseInfo> {
    err.is_fatal().then(|| {
        CloseInfo::new(CONNECTION_LOST_ERROR, &err.to_string(), CloseInitiator::Transport)
    })
}

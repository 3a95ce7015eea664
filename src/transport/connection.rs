//! Session lifecycle state machine.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ready──▶ Ready
//!   │                   │                   │
//!   └──────close────────┴──reject/timeout───┴──close/peer close/drop──▶ Closed
//! ```
//!
//! Closed is terminal.

use tokio::time::Instant;

use super::endpoint::Endpoint;
use crate::core::{MAX_CLOSE_REASON_LEN, SessionId, WebTransportError};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, `async_connect` not called yet.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Handshake accepted; streams may be created.
    Ready,
    /// Terminal.
    Closed,
}

impl SessionPhase {
    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        *self == SessionPhase::Closed
    }

    /// Check if outgoing streams may be created.
    pub fn accepts_streams(&self) -> bool {
        *self == SessionPhase::Ready
    }
}

/// Who ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseInitiator {
    /// `close_session` was called.
    Local,
    /// The peer sent a close.
    Peer,
    /// Handshake rejection, timeout, or connection loss.
    Transport,
}

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Application or transport close code.
    pub error_code: u32,
    /// Reason, at most [`MAX_CLOSE_REASON_LEN`] bytes.
    pub reason: String,
    /// Who ended the session.
    pub initiator: CloseInitiator,
}

impl CloseInfo {
    /// Build a close record, truncating the reason to the wire limit.
    pub fn new(error_code: u32, reason: &str, initiator: CloseInitiator) -> Self {
        Self {
            error_code,
            reason: truncate_reason(reason),
            initiator,
        }
    }
}

/// Truncate `reason` to [`MAX_CLOSE_REASON_LEN`] bytes on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON_LEN {
        return reason.to_string();
    }
    let mut end = MAX_CLOSE_REASON_LEN;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}

/// Full session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current phase.
    pub phase: SessionPhase,
    /// Assigned once Ready.
    pub session_id: Option<SessionId>,
    /// Set by `begin_connect`.
    pub endpoint: Option<Endpoint>,
    /// When the handshake started.
    pub connect_started: Option<Instant>,
    /// When the session became Ready.
    pub ready_at: Option<Instant>,
    /// Set once Closed (absent when an Idle session is closed).
    pub close: Option<CloseInfo>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh Idle session.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            endpoint: None,
            connect_started: None,
            ready_at: None,
            close: None,
        }
    }

    /// Idle → Connecting. At most one connect attempt per session.
    pub fn begin_connect(&mut self, endpoint: Endpoint) -> Result<(), WebTransportError> {
        if self.phase != SessionPhase::Idle {
            return Err(WebTransportError::InvalidState(self.phase));
        }
        self.phase = SessionPhase::Connecting;
        self.endpoint = Some(endpoint);
        self.connect_started = Some(Instant::now());
        Ok(())
    }

    /// Connecting → Ready. Returns `false` if the session left Connecting
    /// in the meantime.
    pub fn complete_handshake(&mut self, session_id: SessionId) -> bool {
        if self.phase != SessionPhase::Connecting {
            return false;
        }
        self.phase = SessionPhase::Ready;
        self.session_id = Some(session_id);
        self.ready_at = Some(Instant::now());
        true
    }

    /// Any → Closed. Returns `false` if already Closed.
    pub fn close(&mut self, info: Option<CloseInfo>) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = SessionPhase::Closed;
        self.close = info;
        true
    }

    /// Check if the session is Closed.
    pub fn is_closed(&self) -> bool {
        self.phase.is_terminal()
    }
}

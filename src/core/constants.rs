//! Protocol constants and error codes.
//!
//! Numeric codes are part of the public contract: listeners compare
//! against them, so they MUST NOT be renumbered.

use std::time::Duration;

// =============================================================================
// STREAM ERROR CODES (delivered through `StreamCallback::on_error`)
// =============================================================================

/// Unclassified stream failure.
pub const UNKNOWN_ERROR: u32 = 0;

/// Stream requested while the session is not Ready.
pub const INVALID_STATE_ERROR: u32 = 1;

// =============================================================================
// SESSION CLOSE CODES (delivered through `on_session_closed`)
// =============================================================================

/// Normal closure.
pub const NO_ERROR: u32 = 0;

/// The handshake did not complete within the configured timeout.
pub const HANDSHAKE_TIMEOUT_ERROR: u32 = 0x1000;

/// The peer connection went away without a close.
pub const CONNECTION_LOST_ERROR: u32 = 0x1001;

/// The connector failed before a status was received, reported as
/// `TransportError::Io` (socket or TLS failure).
pub const HANDSHAKE_FAILED_ERROR: u32 = 0x1002;

// =============================================================================
// WIRE LIMITS
// =============================================================================

/// Maximum length of a session close reason, in bytes.
pub const MAX_CLOSE_REASON_LEN: usize = 1024;

/// Default number of payload bytes drained from one stream per send.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1200;

/// Default bound on the Connecting phase.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default URL port for `https` endpoints.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

// =============================================================================
// STREAM ID LAYOUT (RFC 9000 §2.1)
// =============================================================================

/// Low bit set: server-initiated.
pub const STREAM_ID_SERVER_BIT: u64 = 0x01;

/// Second bit set: unidirectional.
pub const STREAM_ID_UNI_BIT: u64 = 0x02;

/// Distance between consecutive stream ids of the same type.
pub const STREAM_ID_INCREMENT: u64 = 4;

//! Identifiers and small value types shared by every layer.

use std::fmt;
use std::ops::BitOr;

use super::constants::{STREAM_ID_INCREMENT, STREAM_ID_SERVER_BIT, STREAM_ID_UNI_BIT};

/// Session identifier, unique per `TransportManager`.
///
/// Assigned when the session becomes Ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream identifier using the QUIC numbering scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The `index`-th client-initiated stream of the given direction.
    pub const fn client(direction: StreamDirection, index: u64) -> Self {
        let type_bits = match direction {
            StreamDirection::Bidirectional => 0,
            StreamDirection::Unidirectional => STREAM_ID_UNI_BIT,
        };
        Self(index * STREAM_ID_INCREMENT + type_bits)
    }

    /// Raw numeric value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is a client-initiated stream.
    pub fn is_client_initiated(&self) -> bool {
        self.0 & STREAM_ID_SERVER_BIT == 0
    }

    /// Direction encoded in the id.
    pub fn direction(&self) -> StreamDirection {
        if self.0 & STREAM_ID_UNI_BIT == 0 {
            StreamDirection::Bidirectional
        } else {
            StreamDirection::Unidirectional
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Send-only from the local side.
    Unidirectional,
    /// Both sides may send.
    Bidirectional,
}

/// Stream lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Allocated, not yet handed to the caller.
    Pending,
    /// Accepting writes.
    Open,
    /// Closed cleanly; buffers released.
    Closed,
    /// Released with bytes still unsent, or the peer failed a send.
    Errored,
}

impl StreamState {
    /// Closed or Errored.
    pub fn is_released(&self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Errored)
    }
}

/// Send-side statistics snapshot.
///
/// `bytes_sent <= bytes_written` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendStreamStats {
    /// Bytes accepted by `write`.
    pub bytes_written: u64,
    /// Bytes handed to the peer connection.
    pub bytes_sent: u64,
}

/// Security principal on whose behalf a session connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Privileged caller; no `Origin` header is sent.
    System,
    /// Web content with the given origin (e.g. `https://example.com`).
    Origin(String),
}

impl Principal {
    /// The origin to present to the peer, if any.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Principal::System => None,
            Principal::Origin(origin) => Some(origin),
        }
    }
}

/// Security flags forwarded to the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SecurityFlags(u32);

impl SecurityFlags {
    /// No flags.
    pub const NONE: Self = Self(0);

    /// Cross-origin load permitted; security context is null.
    pub const ALLOW_CROSS_ORIGIN_SEC_CONTEXT_IS_NULL: Self = Self(1 << 0);

    /// Require a secure (TLS) context.
    pub const REQUIRE_SECURE_CONTEXT: Self = Self(1 << 1);

    /// Build from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SecurityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_stream_ids() {
        let bidi = StreamId::client(StreamDirection::Bidirectional, 0);
        let uni = StreamId::client(StreamDirection::Unidirectional, 0);
        assert_eq!(bidi.as_u64(), 0);
        assert_eq!(uni.as_u64(), 2);

        let third_uni = StreamId::client(StreamDirection::Unidirectional, 2);
        assert_eq!(third_uni.as_u64(), 10);
        assert_eq!(third_uni.direction(), StreamDirection::Unidirectional);
        assert!(third_uni.is_client_initiated());
        assert!(!StreamId::new(5).is_client_initiated());
    }

    #[test]
    fn test_security_flags() {
        let flags =
            SecurityFlags::ALLOW_CROSS_ORIGIN_SEC_CONTEXT_IS_NULL | SecurityFlags::REQUIRE_SECURE_CONTEXT;
        assert!(flags.contains(SecurityFlags::ALLOW_CROSS_ORIGIN_SEC_CONTEXT_IS_NULL));
        assert!(flags.contains(SecurityFlags::REQUIRE_SECURE_CONTEXT));
        assert!(!SecurityFlags::NONE.contains(SecurityFlags::REQUIRE_SECURE_CONTEXT));
        assert_eq!(flags.bits(), 0b11);
    }

    #[test]
    fn test_principal_origin() {
        assert_eq!(Principal::System.origin(), None);
        assert_eq!(
            Principal::Origin("https://example.com".into()).origin(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_stream_state_released() {
        assert!(!StreamState::Pending.is_released());
        assert!(!StreamState::Open.is_released());
        assert!(StreamState::Closed.is_released());
        assert!(StreamState::Errored.is_released());
    }
}

//! Session configuration.

use std::time::Duration;

use crate::core::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_CHUNK_SIZE, WebTransportError};
use crate::transport::pacing_constants;

/// Configuration shared by every session of a `TransportManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on the Connecting phase.
    pub handshake_timeout: Duration,

    /// Maximum bytes drained from one stream per send round.
    pub max_chunk_size: usize,

    /// Minimum time between two send rounds.
    pub min_send_interval: Duration,

    /// Batching window after the first queued write.
    pub collection_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            min_send_interval: pacing_constants::MIN_SEND_INTERVAL,
            collection_interval: pacing_constants::COLLECTION_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Reject values that would stall the session.
    pub fn validate(&self) -> Result<(), WebTransportError> {
        if self.handshake_timeout.is_zero() {
            return Err(WebTransportError::InvalidArgument(
                "handshake_timeout must be non-zero".into(),
            ));
        }
        if self.max_chunk_size == 0 {
            return Err(WebTransportError::InvalidArgument(
                "max_chunk_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the per-stream chunk size.
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set the minimum interval between send rounds.
    pub fn min_send_interval(mut self, interval: Duration) -> Self {
        self.config.min_send_interval = interval;
        self
    }

    /// Set the write batching window.
    pub fn collection_interval(mut self, interval: Duration) -> Self {
        self.config.collection_interval = interval;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

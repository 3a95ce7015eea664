//! Transport manager: the entry point for creating sessions.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use super::config::SessionConfig;
use super::registry::SessionRegistry;
use super::session::Session;
use crate::core::{Result, SessionId, WebTransportError};
use crate::transport::Connector;

/// Creates sessions and tracks the Ready ones.
///
/// Every session spawns its tasks on the runtime captured at construction.
#[derive(Clone)]
pub struct TransportManager {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: SessionRegistry,
    runtime: Handle,
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("config", &self.config)
            .field("sessions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl TransportManager {
    /// Create a manager on the current tokio runtime.
    ///
    /// Fails with `NoRuntime` outside a runtime, or `InvalidArgument` for
    /// an unusable config.
    pub fn new(config: SessionConfig, connector: impl Connector) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| WebTransportError::NoRuntime(e.to_string()))?;
        Self::with_runtime(config, connector, runtime)
    }

    /// Create a manager spawning onto `runtime`.
    pub fn with_runtime(
        config: SessionConfig,
        connector: impl Connector,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(connector),
            registry: SessionRegistry::new(),
            runtime,
        })
    }

    /// Create a new Idle session.
    pub fn new_transport_session(&self) -> Session {
        debug!("new transport session");
        Session::spawn(
            &self.runtime,
            self.config.clone(),
            Arc::clone(&self.connector),
            self.registry.clone(),
        )
    }

    /// Look up a Ready session by id.
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.registry.get(id)
    }

    /// Number of Ready sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Close every Ready session.
    pub fn close_all(&self, error_code: u32, reason: &str) {
        for session in self.registry.sessions() {
            session.close_session(error_code, reason);
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared registry of Ready sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

//! Registry of Ready sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::session::Session;
use crate::core::SessionId;

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

/// Maps session ids to live sessions. Shared by a manager and its drivers.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    /// Create an empty registry. Ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id, unique for the registry's lifetime.
    pub fn allocate_id(&self) -> SessionId {
        SessionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub(crate) fn insert(&self, id: SessionId, session: Session) {
        self.inner.sessions.write().insert(id, session);
    }

    pub(crate) fn remove(&self, id: SessionId) -> Option<Session> {
        self.inner.sessions.write().remove(&id)
    }

    /// Look up a Ready session.
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.inner.sessions.read().get(&id).cloned()
    }

    /// Number of Ready sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// Check if no session is Ready.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every Ready session, ascending.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.inner.sessions.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every Ready session.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.sessions.read().values().cloned().collect()
    }
}

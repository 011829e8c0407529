//! Registry of live sessions.
//!
//! The accept loop registers each connection before its task starts; the
//! returned [`SessionGuard`] removes the entry again when the task ends.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use protocol::SessionKind;
use uuid::Uuid;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Information about a live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Unique session identifier.
    pub id: SessionId,
    /// Remote address of the peer.
    pub peer: SocketAddr,
    /// Session kind, known once the peer has said hello.
    pub kind: Option<SessionKind>,
    /// Client name from the hello, if any.
    pub client: Option<String>,
    /// When the connection was accepted.
    pub started_at: Instant,
}

/// Thread-safe session registry using DashMap.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection.
    pub fn register(self: &Arc<Self>, peer: SocketAddr) -> SessionGuard {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                peer,
                kind: None,
                client: None,
                started_at: Instant::now(),
            },
        );
        tracing::debug!(session_id = %id, %peer, "Registered session");

        SessionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Lists all live sessions.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Returns the number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live sessions of one kind.
    pub fn count_kind(&self, kind: SessionKind) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().kind == Some(kind))
            .count()
    }

    fn identify(&self, id: &SessionId, kind: SessionKind, client: Option<String>) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.kind = Some(kind);
            entry.client = client;
        }
    }

    fn remove(&self, id: &SessionId) {
        if let Some((id, info)) = self.sessions.remove(id) {
            tracing::debug!(
                session_id = %id,
                kind = ?info.kind,
                duration_ms = info.started_at.elapsed().as_millis() as u64,
                "Session ended"
            );
        }
    }
}

/// Keeps a session registered for as long as it lives.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Record what the peer asked for in its hello.
    pub fn identify(&self, kind: SessionKind, client: Option<String>) {
        self.registry.identify(&self.id, kind, client);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

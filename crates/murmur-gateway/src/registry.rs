use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use murmur_types::events::ServerEvent;

/// Push side of one live connection. Cheap to clone; all clones feed the
/// same socket writer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Returns the handle and the receiver the socket writer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            conn_id: Uuid::new_v4(),
            tx,
        };
        (handle, rx)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue an event for this connection. Returns false once the
    /// connection is gone.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Maps each online user to their single live connection.
///
/// The only shared mutable state in the gateway. `register` overwrites
/// silently: a reconnecting user supersedes the old mapping, and the old
/// connection stops receiving routed traffic without being closed.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `user_id`. Returns the superseded
    /// handle, if any.
    pub async fn register(
        &self,
        user_id: Uuid,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.sessions.write().await.insert(user_id, handle)
    }

    /// Remove the session for `user_id`. No-op if absent.
    pub async fn unregister(&self, user_id: Uuid) -> bool {
        self.sessions.write().await.remove(&user_id).is_some()
    }

    /// Remove the session for `user_id` only if it still belongs to
    /// `conn_id`. A newer connection for the same user is left alone.
    pub async fn release(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&user_id) {
            Some(handle) if handle.conn_id == conn_id => {
                sessions.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    /// Current online set.
    pub async fn snapshot(&self) -> HashSet<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Run `f` over all sessions while holding the read lock. No register
    /// or release can land until `f` returns, so anything `f` pushes is
    /// ordered against concurrent membership changes.
    pub async fn with_sessions<R>(
        &self,
        f: impl FnOnce(&HashMap<Uuid, ConnectionHandle>) -> R,
    ) -> R {
        let sessions = self.sessions.read().await;
        f(&sessions)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::TokenVerifier;
use crate::error::AuthError;
use crate::gatekeeper::{AuthenticatedUser, Gatekeeper};
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionHandle, SessionRegistry};
use crate::relay::SignalRelay;
use crate::router::MessageRouter;
use crate::store::MessageStore;

/// Wires the gateway components around one shared session registry.
/// Cheap to clone; every clone sees the same state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
    gatekeeper: Gatekeeper,
    presence: PresenceBroadcaster,
    router: MessageRouter,
    relay: SignalRelay,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MessageStore>, verifier: Arc<dyn TokenVerifier>) -> Self {
        let registry = SessionRegistry::new();
        Self {
            inner: Arc::new(DispatcherInner {
                gatekeeper: Gatekeeper::new(verifier, store.clone()),
                presence: PresenceBroadcaster::new(registry.clone()),
                router: MessageRouter::new(registry.clone(), store.clone()),
                relay: SignalRelay::new(registry.clone(), store.clone()),
                registry,
                store,
            }),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// The store every component writes through. REST handlers read
    /// history from it too.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.inner.store
    }

    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    pub fn relay(&self) -> &SignalRelay {
        &self.inner.relay
    }

    /// Token check shared by the gateway handshake and the REST middleware.
    pub async fn admit(&self, token: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        self.inner.gatekeeper.admit(token).await
    }

    /// Register `user_id` on `handle`, replacing any previous session, then
    /// broadcast the new online set.
    pub async fn join(&self, user_id: Uuid, handle: ConnectionHandle) {
        let superseded = self.inner.registry.register(user_id, handle).await;
        if let Some(old) = superseded {
            info!("{} re-registered, connection {} orphaned", user_id, old.conn_id());
        }
        self.inner.presence.broadcast_presence().await;
        info!("{} is online. Total online: {}", user_id, self.inner.registry.len().await);
    }

    /// Drop `user_id`'s session if `conn_id` still owns it, and broadcast
    /// when that changed the online set. Returns whether it did.
    pub async fn leave(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        if !self.inner.registry.release(user_id, conn_id).await {
            return false;
        }
        self.inner.presence.broadcast_presence().await;
        info!("{} went offline. Total online: {}", user_id, self.inner.registry.len().await);
        true
    }
}

use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use murmur_types::events::ServerEvent;
use murmur_types::models::UserRef;

use crate::error::StoreError;
use crate::registry::SessionRegistry;
use crate::store::MessageStore;

/// Ephemeral user-to-user signals. Nothing here is queued or retried: an
/// offline target simply misses the push.
#[derive(Clone)]
pub struct SignalRelay {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
}

impl SignalRelay {
    pub fn new(registry: SessionRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Returns whether the receiver was online to get it.
    pub async fn typing(&self, sender: &UserRef, receiver_id: Uuid) -> bool {
        self.push_to(
            receiver_id,
            ServerEvent::Typing {
                sender_id: sender.id,
                username: sender.username.clone(),
            },
        )
        .await
    }

    pub async fn stop_typing(&self, sender_id: Uuid, receiver_id: Uuid) -> bool {
        self.push_to(receiver_id, ServerEvent::StopTyping { sender_id })
            .await
    }

    /// `reader_id` has seen everything `other_user_id` sent them: flip those
    /// messages to seen, then tell `other_user_id` if they are online.
    ///
    /// Safe to repeat; a second call changes nothing and still succeeds.
    /// Returns how many messages changed.
    pub async fn mark_read(
        &self,
        reader_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<usize, StoreError> {
        let changed = self
            .store
            .update_many_seen(other_user_id, reader_id)
            .await
            .inspect_err(|e| {
                error!("Failed to mark {} -> {} as read: {}", other_user_id, reader_id, e)
            })?;

        debug!("{} read {} message(s) from {}", reader_id, changed, other_user_id);
        self.push_to(other_user_id, ServerEvent::MessagesRead { by: reader_id })
            .await;
        Ok(changed)
    }

    async fn push_to(&self, user_id: Uuid, event: ServerEvent) -> bool {
        match self.registry.lookup(user_id).await {
            Some(handle) => handle.push(event),
            None => false,
        }
    }
}

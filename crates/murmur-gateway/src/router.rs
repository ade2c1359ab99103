use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use murmur_types::events::ServerEvent;
use murmur_types::models::ChatMessage;

use crate::error::{DropReason, StoreError};
use crate::registry::{ConnectionHandle, SessionRegistry};
use crate::store::MessageStore;

/// Longest accepted message body, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Sent to the originating connection when a message could not be stored.
pub const SEND_FAILED: &str = "Failed to send message";

/// Result of a send that did not hit a store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Stored and echoed to the sender. `receiver_online` says whether a
    /// live receiver connection accepted the push.
    Delivered {
        message: ChatMessage,
        receiver_online: bool,
    },
    /// Discarded without any signal to the sender.
    Dropped(DropReason),
}

/// Checks run in order; the first failure wins. Returns the trimmed body.
///
/// The length limit applies to the body as sent, before trimming.
pub fn validate(sender_id: Uuid, receiver_id: Uuid, body: &str) -> Result<&str, DropReason> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DropReason::EmptyBody);
    }
    if receiver_id == sender_id {
        return Err(DropReason::SelfSend);
    }
    if body.encode_utf16().count() > MAX_MESSAGE_LEN {
        return Err(DropReason::TooLong);
    }
    Ok(trimmed)
}

/// Validates, persists, then delivers direct messages.
#[derive(Clone)]
pub struct MessageRouter {
    registry: SessionRegistry,
    store: Arc<dyn MessageStore>,
}

impl MessageRouter {
    pub fn new(registry: SessionRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Persist `body` from `sender_id` to `receiver_id`, push the stored
    /// record to the receiver if online, and echo it to `origin`.
    ///
    /// Nothing is pushed to anyone before the store call returns. On a store
    /// failure only `origin` hears about it, via an `error` event.
    pub async fn send(
        &self,
        origin: &ConnectionHandle,
        sender_id: Uuid,
        receiver_id: Uuid,
        body: &str,
    ) -> Result<SendOutcome, StoreError> {
        let body = match validate(sender_id, receiver_id, body) {
            Ok(body) => body,
            Err(reason) => {
                debug!("Dropped message from {}: {}", sender_id, reason);
                return Ok(SendOutcome::Dropped(reason));
            }
        };

        let message = match self.store.create_message(sender_id, receiver_id, body).await {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to store message {} -> {}: {}", sender_id, receiver_id, e);
                origin.push(ServerEvent::Error {
                    message: SEND_FAILED.to_string(),
                });
                return Err(e);
            }
        };

        let receiver_online = match self.registry.lookup(receiver_id).await {
            Some(handle) => handle.push(ServerEvent::ReceiveMessage(message.clone())),
            None => false,
        };
        if !receiver_online {
            debug!("{} offline, message {} kept for history", receiver_id, message.id);
        }

        // Best-effort: the sender may already be gone.
        origin.push(ServerEvent::ReceiveMessage(message.clone()));

        Ok(SendOutcome::Delivered {
            message,
            receiver_online,
        })
    }
}

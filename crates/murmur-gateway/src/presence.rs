use tracing::debug;
use uuid::Uuid;

use murmur_types::events::ServerEvent;

use crate::registry::SessionRegistry;

/// Pushes the full online set to every registered connection.
///
/// No debouncing and no diffing: every join/leave yields exactly one
/// broadcast of the whole set.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: SessionRegistry,
}

impl PresenceBroadcaster {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Returns how many connections accepted the update.
    ///
    /// The set is read and pushed under one registry read lock, so two
    /// broadcasts racing with joins cannot deliver an older set last.
    pub async fn broadcast_presence(&self) -> usize {
        let (online, reached) = self
            .registry
            .with_sessions(|sessions| {
                let mut online: Vec<Uuid> = sessions.keys().copied().collect();
                online.sort();
                let event = ServerEvent::OnlineUsers(online);

                let reached = sessions
                    .values()
                    .filter(|handle| handle.push(event.clone()))
                    .count();
                (sessions.len(), reached)
            })
            .await;

        debug!("Presence broadcast: {} online, {} reached", online, reached);
        reached
    }
}

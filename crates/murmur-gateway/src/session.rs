use tracing::{debug, info};

use murmur_types::events::{ClientEvent, ServerEvent};

use crate::dispatcher::Dispatcher;
use crate::gatekeeper::AuthenticatedUser;
use crate::registry::ConnectionHandle;
use crate::router::SendOutcome;

/// Sent to the originating connection when a read receipt could not be stored.
pub const MARK_READ_FAILED: &str = "Failed to mark messages as read";

/// Lifecycle of an admitted connection. Disconnection ends the session
/// itself; there is no way back in on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Authenticated but not yet announced as online.
    Admitted,
    /// Registered; send/typing/read events are handled.
    Joined,
}

/// Per-connection event handler: one admitted user, one push handle.
pub struct ClientSession {
    dispatcher: Dispatcher,
    user: AuthenticatedUser,
    handle: ConnectionHandle,
    state: ConnectionState,
}

impl ClientSession {
    pub fn new(dispatcher: Dispatcher, user: AuthenticatedUser, handle: ConnectionHandle) -> Self {
        Self {
            dispatcher,
            user,
            handle,
            state: ConnectionState::Admitted,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        let user_id = self.user.user_id;

        if self.state == ConnectionState::Admitted && event != ClientEvent::Join {
            debug!(
                "{} ({}) sent {} before join, ignoring",
                self.user.username,
                user_id,
                event.kind()
            );
            return;
        }

        match event {
            ClientEvent::Join => {
                self.dispatcher.join(user_id, self.handle.clone()).await;
                self.state = ConnectionState::Joined;
            }

            ClientEvent::SendMessage {
                receiver_id,
                message,
            } => {
                let outcome = self
                    .dispatcher
                    .router()
                    .send(&self.handle, user_id, receiver_id, &message)
                    .await;
                // Drops are silent and store errors are already reported
                if let Ok(SendOutcome::Delivered { message, .. }) = outcome {
                    debug!("{} -> {}: message {} stored", user_id, receiver_id, message.id);
                }
            }

            ClientEvent::Typing { receiver_id } => {
                self.dispatcher
                    .relay()
                    .typing(&self.user.user_ref(), receiver_id)
                    .await;
            }

            ClientEvent::StopTyping { receiver_id } => {
                self.dispatcher.relay().stop_typing(user_id, receiver_id).await;
            }

            ClientEvent::MarkAsRead { sender_id } => {
                if self.dispatcher.relay().mark_read(user_id, sender_id).await.is_err() {
                    self.handle.push(ServerEvent::Error {
                        message: MARK_READ_FAILED.to_string(),
                    });
                }
            }
        }
    }

    /// Release this connection's session, if it still owns one.
    pub async fn close(self) {
        let user_id = self.user.user_id;
        let released = self.dispatcher.leave(user_id, self.handle.conn_id()).await;
        info!(
            "{} ({}) disconnected from gateway{}",
            self.user.username,
            user_id,
            if released { "" } else { " (held no session)" }
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::auth::TokenVerifier;
    use crate::store::MessageStore;
    use crate::store::testing::{BrokenStore, store_with_users};

    struct RejectAll;

    #[async_trait]
    impl TokenVerifier for RejectAll {
        async fn verify_token(&self, _: &str) -> Option<Uuid> {
            None
        }
    }

    fn session_for(
        dispatcher: &Dispatcher,
        user_id: Uuid,
        username: &str,
    ) -> (ClientSession, tokio::sync::mpsc::UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = ConnectionHandle::channel();
        let user = AuthenticatedUser {
            user_id,
            username: username.to_string(),
        };
        (ClientSession::new(dispatcher.clone(), user, handle), rx)
    }

    #[tokio::test]
    async fn events_before_join_are_ignored() {
        let (store, ids) = store_with_users(&["alice", "bob"]);
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RejectAll));
        let (mut alice, mut alice_rx) = session_for(&dispatcher, ids[0], "alice");

        alice
            .handle_event(ClientEvent::SendMessage {
                receiver_id: ids[1],
                message: "too early".into(),
            })
            .await;

        assert_eq!(alice.state(), ConnectionState::Admitted);
        assert!(alice_rx.try_recv().is_err());
        assert!(store.find_conversation(ids[0], ids[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn join_registers_and_close_releases() {
        let (store, ids) = store_with_users(&["alice"]);
        let dispatcher = Dispatcher::new(store, Arc::new(RejectAll));
        let (mut alice, mut alice_rx) = session_for(&dispatcher, ids[0], "alice");

        alice.handle_event(ClientEvent::Join).await;
        assert_eq!(alice.state(), ConnectionState::Joined);
        assert_eq!(alice_rx.try_recv().unwrap(), ServerEvent::OnlineUsers(vec![ids[0]]));
        assert!(dispatcher.registry().lookup(ids[0]).await.is_some());

        alice.close().await;
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn superseded_session_close_keeps_new_connection_online() {
        let (store, ids) = store_with_users(&["alice"]);
        let dispatcher = Dispatcher::new(store, Arc::new(RejectAll));
        let (mut first, _first_rx) = session_for(&dispatcher, ids[0], "alice");
        let (mut second, _second_rx) = session_for(&dispatcher, ids[0], "alice");

        first.handle_event(ClientEvent::Join).await;
        second.handle_event(ClientEvent::Join).await;
        let second_conn = second.handle().conn_id();

        first.close().await;
        let live = dispatcher.registry().lookup(ids[0]).await.unwrap();
        assert_eq!(live.conn_id(), second_conn);
    }

    #[tokio::test]
    async fn mark_read_failure_reports_to_reader() {
        let store: Arc<dyn MessageStore> = Arc::new(BrokenStore);
        let dispatcher = Dispatcher::new(store, Arc::new(RejectAll));
        let (mut bob, mut bob_rx) = session_for(&dispatcher, Uuid::new_v4(), "bob");

        bob.handle_event(ClientEvent::Join).await;
        let _presence = bob_rx.try_recv().unwrap();

        bob.handle_event(ClientEvent::MarkAsRead {
            sender_id: Uuid::new_v4(),
        })
        .await;
        assert_eq!(
            bob_rx.try_recv().unwrap(),
            ServerEvent::Error {
                message: MARK_READ_FAILED.to_string()
            }
        );
    }
}

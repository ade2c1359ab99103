//! End-to-end flows through the dispatcher with in-process connection
//! handles and a real in-memory SQLite store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use murmur_db::Database;
use murmur_gateway::auth::TokenVerifier;
use murmur_gateway::dispatcher::Dispatcher;
use murmur_gateway::error::AuthError;
use murmur_gateway::registry::ConnectionHandle;
use murmur_gateway::router::MAX_MESSAGE_LEN;
use murmur_gateway::session::ClientSession;
use murmur_gateway::store::{MessageStore, SqliteStore};
use murmur_types::events::{ClientEvent, ServerEvent};

/// Accepts tokens of the form `user:<uuid>`.
struct PrefixVerifier;

#[async_trait]
impl TokenVerifier for PrefixVerifier {
    async fn verify_token(&self, token: &str) -> Option<Uuid> {
        token.strip_prefix("user:")?.parse().ok()
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<SqliteStore>,
}

impl Harness {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteStore::new(db));
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(PrefixVerifier));
        Self { dispatcher, store }
    }

    fn user(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .db()
            .create_user(&id.to_string(), username, "not-a-real-hash")
            .unwrap();
        id
    }

    /// Admit through the gatekeeper and open a session, without joining.
    async fn connect(&self, user_id: Uuid) -> Client {
        let token = format!("user:{}", user_id);
        let user = self.dispatcher.admit(Some(&token)).await.unwrap();
        let (handle, rx) = ConnectionHandle::channel();
        Client {
            session: ClientSession::new(self.dispatcher.clone(), user, handle),
            rx,
        }
    }

    async fn join(&self, user_id: Uuid) -> Client {
        let mut client = self.connect(user_id).await;
        client.send(ClientEvent::Join).await;
        client
    }
}

struct Client {
    session: ClientSession,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    async fn send(&mut self, event: ClientEvent) {
        self.session.handle_event(event).await;
    }

    fn next(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued so far, skipping presence updates.
    fn drain_non_presence(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.next() {
            if !matches!(event, ServerEvent::OnlineUsers(_)) {
                out.push(event);
            }
        }
        out
    }
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}

#[tokio::test]
async fn message_reaches_receiver_and_echoes_to_sender() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut a = h.join(alice).await;
    let mut b = h.join(bob).await;

    a.send(ClientEvent::SendMessage {
        receiver_id: bob,
        message: "hi".into(),
    })
    .await;

    let to_bob = b.drain_non_presence();
    let to_alice = a.drain_non_presence();
    assert_eq!(to_bob.len(), 1);
    assert_eq!(to_bob, to_alice);

    let ServerEvent::ReceiveMessage(message) = &to_bob[0] else {
        panic!("expected receive_message, got {:?}", to_bob[0]);
    };
    assert_eq!(message.message, "hi");
    assert_eq!(message.sender.id, alice);
    assert_eq!(message.sender.username, "alice");
    assert_eq!(message.receiver.id, bob);
    assert!(!message.seen);

    let stored = h.store.find_conversation(alice, bob).await.unwrap();
    assert_eq!(stored, vec![message.clone()]);
}

#[tokio::test]
async fn oversized_message_is_dropped_silently() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut a = h.join(alice).await;
    let mut b = h.join(bob).await;

    a.send(ClientEvent::SendMessage {
        receiver_id: bob,
        message: "x".repeat(MAX_MESSAGE_LEN + 1),
    })
    .await;

    assert!(a.drain_non_presence().is_empty());
    assert!(b.drain_non_presence().is_empty());
    assert!(h.store.find_conversation(alice, bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_receiver_finds_message_in_history_and_read_receipt_flows_back() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut a = h.join(alice).await;

    a.send(ClientEvent::SendMessage {
        receiver_id: bob,
        message: "are you there?".into(),
    })
    .await;
    assert_eq!(a.drain_non_presence().len(), 1);

    let history = h.store.find_conversation(bob, alice).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].seen);

    let mut b = h.join(bob).await;
    b.send(ClientEvent::MarkAsRead { sender_id: alice }).await;

    assert_eq!(a.drain_non_presence(), vec![ServerEvent::MessagesRead { by: bob }]);
    assert!(b.drain_non_presence().is_empty());
    let history = h.store.find_conversation(bob, alice).await.unwrap();
    assert!(history[0].seen);
}

#[tokio::test]
async fn typing_signals_only_reach_the_target() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let carol = h.user("carol");
    let mut a = h.join(alice).await;
    let mut b = h.join(bob).await;
    let mut c = h.join(carol).await;

    a.send(ClientEvent::Typing { receiver_id: bob }).await;
    a.send(ClientEvent::StopTyping { receiver_id: bob }).await;

    assert_eq!(
        b.drain_non_presence(),
        vec![
            ServerEvent::Typing {
                sender_id: alice,
                username: "alice".into()
            },
            ServerEvent::StopTyping { sender_id: alice },
        ]
    );
    assert!(a.drain_non_presence().is_empty());
    assert!(c.drain_non_presence().is_empty());
}

#[tokio::test]
async fn events_before_join_do_nothing() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut b = h.join(bob).await;
    let mut a = h.connect(alice).await;

    a.send(ClientEvent::Typing { receiver_id: bob }).await;
    a.send(ClientEvent::SendMessage {
        receiver_id: bob,
        message: "early".into(),
    })
    .await;

    assert!(b.drain_non_presence().is_empty());
    assert!(a.next().is_none());
    assert!(h.dispatcher.registry().lookup(alice).await.is_none());
}

#[tokio::test]
async fn presence_is_broadcast_on_join_and_leave() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut a = h.join(alice).await;
    assert_eq!(a.next(), Some(ServerEvent::OnlineUsers(vec![alice])));

    let b = h.join(bob).await;
    assert_eq!(
        a.next(),
        Some(ServerEvent::OnlineUsers(sorted(vec![alice, bob])))
    );

    b.session.close().await;
    assert_eq!(a.next(), Some(ServerEvent::OnlineUsers(vec![alice])));
    assert!(a.next().is_none());
}

#[tokio::test]
async fn reconnect_routes_to_the_newest_connection() {
    let h = Harness::new();
    let alice = h.user("alice");
    let bob = h.user("bob");
    let mut b = h.join(bob).await;
    let mut old = h.join(alice).await;
    let mut new = h.join(alice).await;
    old.drain_non_presence();
    b.drain_non_presence();

    b.send(ClientEvent::SendMessage {
        receiver_id: alice,
        message: "which tab?".into(),
    })
    .await;
    assert_eq!(new.drain_non_presence().len(), 1);
    assert!(old.drain_non_presence().is_empty());
    assert_eq!(b.drain_non_presence().len(), 1);

    // The superseded connection closing must not take alice offline
    old.session.close().await;
    assert!(h.dispatcher.registry().lookup(alice).await.is_some());
    assert!(b.next().is_none());
}

#[tokio::test]
async fn unknown_and_missing_tokens_are_rejected() {
    let h = Harness::new();

    assert!(matches!(h.dispatcher.admit(None).await, Err(AuthError::NoToken)));
    assert!(matches!(
        h.dispatcher.admit(Some("garbage")).await,
        Err(AuthError::InvalidToken)
    ));
    let ghost = format!("user:{}", Uuid::new_v4());
    assert!(matches!(
        h.dispatcher.admit(Some(&ghost)).await,
        Err(AuthError::UnknownUser)
    ));
}

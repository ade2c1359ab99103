use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChatMessage;

/// Events sent FROM client TO server over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Client is ready to be marked online
    Join,

    /// Send a direct message
    SendMessage { receiver_id: Uuid, message: String },

    /// Started typing to a user
    Typing { receiver_id: Uuid },

    /// Stopped typing to a user
    StopTyping { receiver_id: Uuid },

    /// Everything `sender_id` sent to us has been read
    MarkAsRead { sender_id: Uuid },
}

impl ClientEvent {
    /// Short tag for logs. Never includes message bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::SendMessage { .. } => "send_message",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stop_typing",
            Self::MarkAsRead { .. } => "mark_as_read",
        }
    }
}

/// Events pushed FROM server TO client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Server confirms successful admission
    Ready { user_id: Uuid, username: String },

    /// Full set of online users, sent on every join/leave
    OnlineUsers(Vec<Uuid>),

    /// A stored message, delivered to the receiver and echoed to the sender
    ReceiveMessage(ChatMessage),

    /// A user started typing to us
    Typing { sender_id: Uuid, username: String },

    /// A user stopped typing to us
    StopTyping { sender_id: Uuid },

    /// The receiver has read our messages
    MessagesRead { by: Uuid },

    /// Something we asked for failed
    Error { message: String },
}

impl ServerEvent {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::OnlineUsers(_) => "online_users",
            Self::ReceiveMessage(_) => "receive_message",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stop_typing",
            Self::MessagesRead { .. } => "messages_read",
            Self::Error { .. } => "error",
        }
    }
}

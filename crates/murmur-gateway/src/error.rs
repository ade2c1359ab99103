use thiserror::Error;

/// The backing store could not complete a read or write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why a connection attempt was refused. Fatal to that attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication error: No token")]
    NoToken,

    #[error("Authentication error: Invalid token")]
    InvalidToken,

    #[error("Authentication error: User not found")]
    UnknownUser,

    #[error("Authentication error: {0}")]
    Store(#[from] StoreError),
}

/// Why an outbound message was silently discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("message body is empty")]
    EmptyBody,

    #[error("message addressed to its sender")]
    SelfSend,

    #[error("message body is too long")]
    TooLong,
}

//! Presence and message-delivery coordinator.
//!
//! Admits authenticated WebSocket connections, tracks which users are
//! reachable, and routes messages, typing signals and read receipts to the
//! right live connection. Storage and credential checks sit behind the
//! [`store::MessageStore`] and [`auth::TokenVerifier`] traits.

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod gatekeeper;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;
pub mod store;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use murmur_types::models::UserRef;

use crate::auth::TokenVerifier;
use crate::error::AuthError;
use crate::store::MessageStore;

/// Identity attached to a connection that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
}

impl AuthenticatedUser {
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.user_id,
            username: self.username.clone(),
        }
    }
}

/// Pull the token out of a connection handshake: the `token` query
/// parameter wins, then an `Authorization: Bearer` header. Blank values
/// count as absent.
pub fn token_from_handshake<'a>(
    query_token: Option<&'a str>,
    authorization: Option<&'a str>,
) -> Option<&'a str> {
    query_token
        .or_else(|| authorization.and_then(|h| h.strip_prefix("Bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticates a connection attempt once, before any event handling.
#[derive(Clone)]
pub struct Gatekeeper {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn MessageStore>,
}

impl Gatekeeper {
    pub fn new(verifier: Arc<dyn TokenVerifier>, store: Arc<dyn MessageStore>) -> Self {
        Self { verifier, store }
    }

    pub async fn admit(&self, token: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let token = token.ok_or(AuthError::NoToken)?;

        let user_id = self
            .verifier
            .verify_token(token)
            .await
            .ok_or(AuthError::InvalidToken)?;

        let user = match self.store.find_user(user_id).await? {
            Some(user) => user,
            None => {
                debug!("Token for unknown user {}", user_id);
                return Err(AuthError::UnknownUser);
            }
        };

        debug!("{} ({}) admitted", user.username, user.id);
        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::testing::{BrokenStore, store_with_users};

    /// Accepts tokens of the form "user:<uuid>".
    struct PrefixVerifier;

    #[async_trait]
    impl TokenVerifier for PrefixVerifier {
        async fn verify_token(&self, token: &str) -> Option<Uuid> {
            token.strip_prefix("user:")?.parse().ok()
        }
    }

    #[test]
    fn query_token_preferred_over_header() {
        assert_eq!(token_from_handshake(Some("q"), Some("Bearer h")), Some("q"));
        assert_eq!(token_from_handshake(None, Some("Bearer h")), Some("h"));
        assert_eq!(token_from_handshake(None, Some("Basic h")), None);
        assert_eq!(token_from_handshake(Some("  "), None), None);
        assert_eq!(token_from_handshake(None, None), None);
    }

    #[tokio::test]
    async fn admits_known_user() {
        let (store, ids) = store_with_users(&["alice"]);
        let gate = Gatekeeper::new(Arc::new(PrefixVerifier), store);

        let user = gate.admit(Some(&format!("user:{}", ids[0]))).await.unwrap();
        assert_eq!(user.user_id, ids[0]);
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn rejects_missing_token() {
        let (store, _) = store_with_users(&[]);
        let gate = Gatekeeper::new(Arc::new(PrefixVerifier), store);
        assert!(matches!(gate.admit(None).await, Err(AuthError::NoToken)));
    }

    #[tokio::test]
    async fn rejects_invalid_token() {
        let (store, _) = store_with_users(&["alice"]);
        let gate = Gatekeeper::new(Arc::new(PrefixVerifier), store);
        assert!(matches!(gate.admit(Some("forged")).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_valid_token_for_unknown_user() {
        let (store, _) = store_with_users(&["alice"]);
        let gate = Gatekeeper::new(Arc::new(PrefixVerifier), store);
        let token = format!("user:{}", Uuid::new_v4());
        assert!(matches!(gate.admit(Some(&token)).await, Err(AuthError::UnknownUser)));
    }

    #[tokio::test]
    async fn store_failure_rejects() {
        let gate = Gatekeeper::new(Arc::new(PrefixVerifier), Arc::new(BrokenStore));
        let token = format!("user:{}", Uuid::new_v4());
        assert!(matches!(gate.admit(Some(&token)).await, Err(AuthError::Store(_))));
    }
}

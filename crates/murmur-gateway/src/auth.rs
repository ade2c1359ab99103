use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use murmur_types::api::Claims;

/// Resolves an opaque bearer token to the user it was issued for.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    /// `None` for malformed, forged or expired tokens.
    async fn verify_token(&self, token: &str) -> Option<Uuid>;
}

/// Verifies HS256 JWTs issued by murmur-api.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify_token(&self, token: &str) -> Option<Uuid> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                debug!("Rejected token: {}", e);
                None
            }
        }
    }
}

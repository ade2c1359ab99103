use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::error;

use murmur_gateway::error::AuthError;

use crate::auth::AppState;

/// Extract the bearer token and run it through the same admission check as
/// the gateway handshake. Inserts the resolved `AuthenticatedUser`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = match state.dispatcher.admit(Some(token.trim())).await {
        Ok(user) => user,
        Err(AuthError::Store(e)) => {
            error!("Token check failed on store: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

//! REST surface: accounts, user directory and conversation history.

pub mod auth;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod users;

#[cfg(test)]
mod testing;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_mw,
    routing::{get, post},
};

use crate::auth::AppState;

/// Largest JSON body accepted on any route.
pub const MAX_BODY_BYTES: usize = 10 * 1024;

/// `/api/*` routes plus `/health`. Everything except register, login and
/// health requires a bearer token. Register and login share the strict
/// auth limit; the rest of `/api` gets the general one.
pub fn router(state: AppState) -> Router {
    let accounts = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .layer(axum_mw::from_fn_with_state(
            state.auth_limiter.clone(),
            rate_limit::limit,
        ));

    let protected = Router::new()
        .route("/api/users", get(users::list_users))
        .route("/api/messages/{user_id}", get(users::get_conversation))
        .layer(axum_mw::from_fn_with_state(state.clone(), middleware::require_auth))
        .layer(axum_mw::from_fn_with_state(
            state.api_limiter.clone(),
            rate_limit::limit,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(accounts)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

//! Assembles the murmur HTTP/WebSocket application.

pub mod config;
pub mod gateway;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use murmur_api::auth::{AppState, AppStateInner};
use murmur_api::rate_limit::RateLimiter;
use murmur_db::Database;
use murmur_gateway::auth::JwtVerifier;
use murmur_gateway::dispatcher::Dispatcher;
use murmur_gateway::store::SqliteStore;

use crate::config::ServerConfig;

/// Wire the store, verifier and dispatcher around an opened database.
pub fn build_state(db: Arc<Database>, config: &ServerConfig) -> AppState {
    let store = Arc::new(SqliteStore::new(db.clone()));
    let verifier = Arc::new(JwtVerifier::new(&config.jwt_secret));
    let dispatcher = Dispatcher::new(store, verifier);

    Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        dispatcher,
        started_at: Instant::now(),
        auth_limiter: Arc::new(RateLimiter::auth()),
        api_limiter: Arc::new(RateLimiter::api()),
    })
}

/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limits can key on the client address.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    let ws_route = gateway::routes(state.dispatcher.clone(), config.heartbeat_interval);

    Router::new()
        .merge(murmur_api::router(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

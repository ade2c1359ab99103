use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{error, warn};

use murmur_gateway::connection;
use murmur_gateway::dispatcher::Dispatcher;
use murmur_gateway::error::AuthError;
use murmur_gateway::gatekeeper::token_from_handshake;

/// Largest inbound frame. A maximal message with every unit escaped
/// (`\uXXXX`) still fits with room for the envelope.
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

#[derive(Clone)]
struct GatewayState {
    dispatcher: Dispatcher,
    heartbeat_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

pub fn routes(dispatcher: Dispatcher, heartbeat_interval: Duration) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            dispatcher,
            heartbeat_interval,
        })
}

/// Admit before upgrading: a rejected handshake never becomes a socket.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = token_from_handshake(query.token.as_deref(), authorization);

    let user = match state.dispatcher.admit(token).await {
        Ok(user) => user,
        Err(AuthError::Store(e)) => {
            error!("Gateway admission failed on store: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Authentication unavailable")
                .into_response();
        }
        Err(e) => {
            warn!("Gateway handshake rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    ws.max_message_size(MAX_FRAME_BYTES)
        .max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, state.dispatcher, user, state.heartbeat_interval)
        })
}

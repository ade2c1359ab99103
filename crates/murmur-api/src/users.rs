use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, warn};
use uuid::Uuid;

use murmur_gateway::gatekeeper::AuthenticatedUser;
use murmur_types::models::{ChatMessage, User};

use crate::auth::{AppState, blocking};

/// Everyone except the caller, ordered by username.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(me): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<User>>, StatusCode> {
    let db = state.db.clone();
    let users = blocking(move || {
        db.list_users_except(&me.user_id.to_string())
            .and_then(|rows| {
                rows.into_iter()
                    .map(|r| r.into_model())
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .map_err(|e| {
                error!("Failed to list users: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })
    })
    .await?;

    Ok(Json(users))
}

/// Full history between the caller and `user_id`, oldest first.
///
/// Opening a conversation counts as reading it: once the history has been
/// loaded, everything `user_id` sent the caller is marked seen and
/// `user_id` gets a read receipt if they are online. The response shows the
/// records as they were before that.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(me): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let store = state.dispatcher.store();

    let peer = store.find_user(user_id).await.map_err(|e| {
        error!("Failed to look up {}: {}", user_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if peer.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let messages = store
        .find_conversation(me.user_id, user_id)
        .await
        .map_err(|e| {
            error!("Failed to load conversation: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // History is already loaded; a failed receipt only leaves messages unseen
    if let Err(e) = state.dispatcher.relay().mark_read(me.user_id, user_id).await {
        warn!("Conversation loaded but read receipt failed: {}", e);
    }

    Ok(Json(messages))
}

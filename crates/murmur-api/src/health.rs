use axum::{Json, extract::State};

use murmur_types::api::HealthResponse;

use crate::auth::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

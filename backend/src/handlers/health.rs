use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::{db::connection::ping, state::AppState};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now(),
    }))
}

pub async fn db_health(State(state): State<AppState>) -> impl IntoResponse {
    match ping(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "connected" })),
        ),
        Err(err) => {
            tracing::error!(error = ?err, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "database": "disconnected" })),
            )
        }
    }
}

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    error::AppError,
    models::page_view::{RealtimeStats, TrackPageViewRequest, TrafficStats, TrafficStatsQuery},
    repositories::traffic as traffic_repo,
    services::traffic::{compute_stats, page_view_from, realtime, TrafficPeriod},
    state::AppState,
    utils::request::{user_agent, ClientIp},
};

pub async fn track_page_view(
    State(state): State<AppState>,
    client: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<TrackPageViewRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    payload.validate()?;
    let view = page_view_from(
        payload,
        client.to_string_opt(),
        user_agent(&headers),
        Utc::now(),
    );
    traffic_repo::insert_page_view(&state.pool, &view).await?;
    Ok((StatusCode::CREATED, Json(json!({ "tracked": true }))))
}

pub async fn traffic_stats(
    State(state): State<AppState>,
    Query(q): Query<TrafficStatsQuery>,
) -> Result<Json<TrafficStats>, AppError> {
    let period = TrafficPeriod::parse_opt(q.period.as_deref()).map_err(AppError::BadRequest)?;
    let stats = compute_stats(&state.pool, period, Utc::now(), &state.config.time_zone).await?;
    Ok(Json(stats))
}

pub async fn traffic_realtime(
    State(state): State<AppState>,
) -> Result<Json<RealtimeStats>, AppError> {
    Ok(Json(realtime(&state.pool, Utc::now()).await?))
}

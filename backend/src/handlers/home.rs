use axum::{extract::State, Json};
use chrono::Utc;

use crate::{
    error::AppError,
    handlers::gallery::gallery_response,
    models::home::HomeResponse,
    repositories::{
        event as event_repo, gallery as gallery_repo, project as project_repo,
        settings as settings_repo, team as team_repo, tip as tip_repo,
    },
    state::AppState,
};

const UPCOMING_EVENTS: i64 = 3;
const FEATURED_PROJECTS: i64 = 3;
const RECENT_GALLERY: i64 = 6;
const LATEST_TIPS: i64 = 3;

/// Everything the landing page renders, in one round trip.
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeResponse>, AppError> {
    let pool = &state.pool;
    let (settings, upcoming_events, featured_projects, gallery, latest_tips, team_count) =
        tokio::try_join!(
            settings_repo::get_or_create(pool),
            event_repo::upcoming_events(pool, Utc::now(), UPCOMING_EVENTS),
            project_repo::featured_projects(pool, FEATURED_PROJECTS),
            gallery_repo::recent_published(pool, RECENT_GALLERY),
            tip_repo::latest_published(pool, LATEST_TIPS),
            team_repo::count_active(pool),
        )?;

    let cloud_name = state.config.media_cloud_name.as_str();
    Ok(Json(HomeResponse {
        settings: settings.into(),
        upcoming_events,
        featured_projects,
        recent_gallery: gallery
            .into_iter()
            .map(|item| gallery_response(item, cloud_name))
            .collect(),
        latest_tips,
        team_count,
    }))
}

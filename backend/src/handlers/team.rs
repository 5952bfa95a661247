use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json as DbJson;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::{
    error::AppError,
    handlers::common::{
        discard_images, parse_filter, patch_optional, trimmed, upload_image, ContentForm,
    },
    models::{
        team::{
            social_patch, CreateTeamMemberRequest, ReorderRequest, TeamListQuery, TeamMember,
            TeamStatus, UpdateTeamMemberRequest,
        },
        user::User,
    },
    repositories::team::{self as team_repo, TeamFilters},
    state::AppState,
};

const IMAGE_FOLDER: &str = "team";
const IMAGE_FIELD: &str = "image";

pub async fn list_team(
    State(state): State<AppState>,
    Query(q): Query<TeamListQuery>,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    let filters = TeamFilters {
        department: trimmed(q.department),
        year: q.year,
        status: Some(TeamStatus::Active),
    };
    Ok(Json(team_repo::list_members(&state.pool, &filters).await?))
}

pub async fn admin_list_team(
    State(state): State<AppState>,
    Query(q): Query<TeamListQuery>,
) -> Result<Json<Vec<TeamMember>>, AppError> {
    let filters = TeamFilters {
        department: trimmed(q.department),
        year: q.year,
        status: parse_filter(q.status.as_deref(), "status")?,
    };
    Ok(Json(team_repo::list_members(&state.pool, &filters).await?))
}

pub async fn get_team_member(
    State(state): State<AppState>,
    viewer: Option<Extension<User>>,
    Path(id): Path<String>,
) -> Result<Json<TeamMember>, AppError> {
    let is_admin = viewer.map(|Extension(user)| user.is_admin()).unwrap_or(false);
    team_repo::find_by_id(&state.pool, &id)
        .await?
        .filter(|member| is_admin || member.status == TeamStatus::Active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Team member not found".into()))
}

pub async fn create_team_member(
    State(state): State<AppState>,
    mut form: ContentForm,
) -> Result<(StatusCode, Json<TeamMember>), AppError> {
    let payload: CreateTeamMemberRequest = form.payload()?;
    let social = social_patch(
        payload.social.as_deref(),
        payload.linkedin,
        payload.github,
        payload.twitter,
        payload.website,
    )
    .map_err(|err| AppError::BadRequest(format!("Invalid social links: {}", err)))?;

    let display_order = match payload.display_order {
        Some(order) => order,
        None => team_repo::next_display_order(&state.pool).await?,
    };

    let image = match form.take_file(IMAGE_FIELD) {
        Some(file) => Some(upload_image(&state, file, IMAGE_FOLDER).await?),
        None => None,
    };

    let now = Utc::now();
    let member = TeamMember {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        position: payload.position.trim().to_string(),
        department: payload.department.trim().to_string(),
        bio: trimmed(payload.bio),
        email: trimmed(payload.email).map(|email| email.to_lowercase()),
        image: image.map(DbJson),
        social: DbJson(social),
        display_order,
        year: payload.year,
        status: payload.status.unwrap_or(TeamStatus::Active),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = team_repo::insert_member(&state.pool, &member).await {
        discard_images(&state, member.image_public_id().into_iter().collect());
        return Err(err.into());
    }
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: ContentForm,
) -> Result<Json<TeamMember>, AppError> {
    let payload: UpdateTeamMemberRequest = form.payload()?;
    if let Some(email) = payload.email.as_deref().map(str::trim) {
        if !email.is_empty() && !email.validate_email() {
            return Err(AppError::BadRequest("email must be a valid address".into()));
        }
    }

    let mut member = team_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Team member not found".into()))?;

    let social = social_patch(
        payload.social.as_deref(),
        payload.linkedin,
        payload.github,
        payload.twitter,
        payload.website,
    )
    .map_err(|err| AppError::BadRequest(format!("Invalid social links: {}", err)))?;
    member.social.0.merge(social);

    if let Some(name) = payload.name {
        member.name = name.trim().to_string();
    }
    if let Some(position) = payload.position {
        member.position = position.trim().to_string();
    }
    if let Some(department) = payload.department {
        member.department = department.trim().to_string();
    }
    patch_optional(&mut member.bio, payload.bio);
    patch_optional(&mut member.email, payload.email.map(|email| email.to_lowercase()));
    if let Some(display_order) = payload.display_order {
        member.display_order = display_order;
    }
    if payload.year.is_some() {
        member.year = payload.year;
    }
    if let Some(status) = payload.status {
        member.status = status;
    }

    let replaced = match form.take_file(IMAGE_FIELD) {
        Some(file) => {
            let uploaded = upload_image(&state, file, IMAGE_FOLDER).await?;
            Some(std::mem::replace(&mut member.image, Some(DbJson(uploaded))))
        }
        None => None,
    };
    member.updated_at = Utc::now();

    if let Err(err) = team_repo::update_member(&state.pool, &member).await {
        if replaced.is_some() {
            discard_images(&state, member.image_public_id().into_iter().collect());
        }
        return Err(err.into());
    }
    if let Some(Some(previous)) = replaced {
        discard_images(&state, vec![previous.0.public_id]);
    }
    Ok(Json(member))
}

pub async fn delete_team_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let member = team_repo::delete_member(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Team member not found".into()))?;
    discard_images(&state, member.image_public_id().into_iter().collect());
    Ok(Json(json!({ "message": "Team member deleted" })))
}

pub async fn reorder_team(
    State(state): State<AppState>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<Value>, AppError> {
    payload.validate()?;
    let updated = team_repo::reorder(&state.pool, &payload.items).await?;
    Ok(Json(json!({ "updated": updated })))
}

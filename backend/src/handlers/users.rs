use axum::{
    extract::{Extension, State},
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::common::trimmed,
    models::user::{normalize_email, UpdateProfileRequest, User, UserResponse},
    repositories::user as user_repo,
    state::AppState,
};

pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let name = trimmed(payload.name);
    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref().filter(|email| *email != user.email) {
        if user_repo::find_by_email(&state.pool, email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
    }

    let updated = user_repo::update_profile(
        &state.pool,
        &user.id,
        name.as_deref(),
        email.as_deref(),
        payload.avatar_url.as_deref(),
    )
    .await?;
    Ok(Json(UserResponse::from(updated)))
}

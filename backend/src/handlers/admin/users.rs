use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    handlers::common::{parse_filter, trimmed},
    models::{
        pagination::{Paginated, Pagination},
        user::{UpdateRoleRequest, UpdateStatusRequest, User, UserListQuery, UserResponse},
    },
    repositories::user::{self as user_repo, UserFilters},
    state::AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Paginated<UserResponse>>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = UserFilters {
        role: parse_filter(q.role.as_deref(), "role")?,
        search: trimmed(q.search),
    };
    let (users, total) =
        user_repo::list_users(&state.pool, &filters, pagination.limit, pagination.offset())
            .await?;
    Ok(Json(
        Paginated::new(users, pagination, total).map(UserResponse::from),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if admin.id == id {
        return Err(AppError::BadRequest("You cannot change your own role".into()));
    }
    let user = user_repo::update_role(&state.pool, &id, payload.role).await?;
    tracing::info!(user_id = %id, role = %payload.role, by = %admin.id, "User role changed");
    Ok(Json(UserResponse::from(user)))
}

pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if admin.id == id {
        return Err(AppError::BadRequest(
            "You cannot change your own account status".into(),
        ));
    }
    let user = user_repo::update_status(&state.pool, &id, payload.is_active).await?;
    if !payload.is_active {
        user_repo::clear_refresh_token(&state.pool, &id).await?;
    }
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if admin.id == id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }
    if !user_repo::delete_user(&state.pool, &id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(json!({ "message": "User deleted" })))
}

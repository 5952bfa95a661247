use std::time::Duration;

use axum::{
    extract::{Extension, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        normalize_email, AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest,
        User, UserResponse, UserRole,
    },
    repositories::{settings as settings_repo, user as user_repo},
    state::AppState,
    utils::{
        cookies::{
            build_auth_cookie, build_clear_cookie, extract_cookie_value, CookieOptions,
            REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH,
        },
        jwt::{
            create_access_token, create_refresh_token, refresh_token_matches,
            verify_refresh_token, RefreshToken,
        },
        password::{hash_password, verify_password},
    },
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_REFRESH: &str = "Invalid or expired refresh token";

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = settings_repo::get_or_create(&state.pool).await?;
    if !settings.features.registrations_open {
        return Err(AppError::Forbidden("Registrations are closed".into()));
    }

    let email = normalize_email(&payload.email);
    if user_repo::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let now = chrono::Utc::now();
    let mut user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email,
        password_hash: hash_password(&payload.password)?,
        role: UserRole::Member,
        avatar_url: None,
        is_active: true,
        refresh_token_hash: None,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    // Role is decided under the users table lock.
    user_repo::insert_registered_user(&state.pool, &mut user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    let (headers, body) = issue_session(&state, user).await?;
    Ok((StatusCode::CREATED, headers, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = user_repo::find_by_email(&state.pool, &normalize_email(&payload.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }
    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }

    let (headers, body) = issue_session(&state, user).await?;
    Ok((headers, Json(body)))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_cookie(&headers)
        .ok_or_else(|| AppError::Unauthorized("Refresh token is required".into()))?;

    let claims = verify_refresh_token(&token, &state.config.jwt_refresh_secret)
        .map_err(|_| AppError::Unauthorized(INVALID_REFRESH.into()))?;

    let user = user_repo::find_by_id(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_REFRESH.into()))?;
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    // A signature-valid token whose digest was rotated away or cleared is dead.
    let Some(stored) = user
        .refresh_token_hash
        .as_deref()
        .filter(|stored| refresh_token_matches(Some(stored), &token))
    else {
        tracing::warn!(user_id = %user.id, "Rejected revoked refresh token");
        return Err(AppError::Unauthorized(INVALID_REFRESH.into()));
    };

    let next = new_refresh_token(&state, &user)?;
    if !user_repo::rotate_refresh_token(&state.pool, &user.id, stored, &next.digest).await? {
        return Err(AppError::Unauthorized(INVALID_REFRESH.into()));
    }

    let body = auth_response(&state, &user)?;
    let headers = cookie_headers(build_auth_cookie(
        REFRESH_COOKIE_NAME,
        &next.token,
        refresh_max_age(&state),
        REFRESH_COOKIE_PATH,
        CookieOptions::from_config(&state.config),
    ))?;
    Ok((headers, Json(body)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    user_repo::clear_refresh_token(&state.pool, &user.id).await?;
    let headers = clear_cookie_headers(&state)?;
    Ok((headers, Json(json!({ "message": "Logged out" }))))
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }
    if payload.current_password == payload.new_password {
        return Err(AppError::BadRequest(
            "New password must differ from the current password".into(),
        ));
    }

    let hash = hash_password(&payload.new_password)?;
    user_repo::update_password(&state.pool, &user.id, &hash).await?;
    user_repo::clear_refresh_token(&state.pool, &user.id).await?;

    let headers = clear_cookie_headers(&state)?;
    Ok((
        headers,
        Json(json!({ "message": "Password updated. Please sign in again." })),
    ))
}

async fn issue_session(state: &AppState, user: User) -> Result<(HeaderMap, AuthResponse), AppError> {
    let refresh = new_refresh_token(state, &user)?;
    user_repo::record_login(&state.pool, &user.id, &refresh.digest).await?;

    let body = auth_response(state, &user)?;
    let headers = cookie_headers(build_auth_cookie(
        REFRESH_COOKIE_NAME,
        &refresh.token,
        refresh_max_age(state),
        REFRESH_COOKIE_PATH,
        CookieOptions::from_config(&state.config),
    ))?;
    Ok((headers, body))
}

fn new_refresh_token(state: &AppState, user: &User) -> Result<RefreshToken, AppError> {
    Ok(create_refresh_token(
        user.id.clone(),
        &state.config.jwt_refresh_secret,
        state.config.refresh_token_expiration_days,
    )?)
}

fn auth_response(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let access_token = create_access_token(
        user.id.clone(),
        user.email.clone(),
        user.role.as_str().to_string(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_minutes,
    )?;
    Ok(AuthResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: state.config.jwt_expiration_minutes * 60,
        user: UserResponse::from(user.clone()),
    })
}

fn refresh_max_age(state: &AppState) -> Duration {
    Duration::from_secs(state.config.refresh_token_expiration_days * 24 * 60 * 60)
}

fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| extract_cookie_value(value, REFRESH_COOKIE_NAME))
}

fn cookie_headers(cookie: String) -> Result<HeaderMap, AppError> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|err| AppError::InternalServerError(err.into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

fn clear_cookie_headers(state: &AppState) -> Result<HeaderMap, AppError> {
    cookie_headers(build_clear_cookie(
        REFRESH_COOKIE_NAME,
        REFRESH_COOKIE_PATH,
        CookieOptions::from_config(&state.config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_static("session=1; refresh_token=abc.def.ghi"),
        );
        assert_eq!(refresh_cookie(&headers).as_deref(), Some("abc.def.ghi"));
        assert_eq!(refresh_cookie(&HeaderMap::new()), None);
    }
}

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::user::User,
    repositories::user as user_repo,
    state::AppState,
    utils::jwt::{verify_access_token, Claims},
};

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

// Auth + require admin role for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    if !user.is_admin() {
        let mut response = AppError::Forbidden("Admin access required".into()).into_response();
        response.extensions_mut().insert(user);
        return Ok(response);
    }

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    Ok(response)
}

/// Attaches the caller when a valid bearer token is present; never rejects.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut user = None;
    if bearer_token(request.headers()).is_some() {
        if let Ok((claims, found)) = authenticate_request(request.headers(), &state).await {
            request.extensions_mut().insert(claims);
            request.extensions_mut().insert(found.clone());
            user = Some(found);
        }
    }

    let mut response = next.run(request).await;
    if let Some(user) = user {
        response.extensions_mut().insert(user);
    }
    response
}

pub fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(rest) = header.strip_prefix("bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate_request(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(Claims, User), AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    let claims = verify_access_token(token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user = user_repo::find_by_id(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    Ok((claims, user))
}

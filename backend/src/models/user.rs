//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::rules::validate_password_strength;

text_enum! {
    /// Supported user roles stored in the database.
    UserRole {
        Member => "member",
        Admin => "admin",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of an account.
pub struct User {
    pub id: String,
    pub name: String,
    /// Always stored lowercased.
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    /// SHA-256 digest of the currently valid refresh token.
    pub refresh_token_hash: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_validates_fields() {
        let ok = RegisterRequest {
            name: "Ada".into(),
            email: "ada@club.test".into(),
            password: "analytical1".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            name: "A".into(),
            email: "not-an-email".into(),
            password: "short".into(),
        };
        let errors = bad.validate().expect_err("invalid");
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn user_response_omits_secrets() {
        let now = Utc::now();
        let user = User {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@club.test".into(),
            password_hash: "hash".into(),
            role: UserRole::Admin,
            avatar_url: None,
            is_active: true,
            refresh_token_hash: Some("digest".into()),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(user.is_admin());
        let json = serde_json::to_value(UserResponse::from(user)).expect("json");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Ada@Club.TEST "), "ada@club.test");
    }
}

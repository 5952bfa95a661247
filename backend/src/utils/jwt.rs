use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// A freshly signed refresh token together with the digest that gets stored
/// on the user row.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn new(user_id: String, email: String, role: String, expiration_minutes: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::minutes(expiration_minutes as i64);

        Self {
            sub: user_id,
            email,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

pub fn create_access_token(
    user_id: String,
    email: String,
    role: String,
    secret: &str,
    expiration_minutes: u64,
) -> anyhow::Result<String> {
    let claims = Claims::new(user_id, email, role, expiration_minutes);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn create_refresh_token(
    user_id: String,
    secret: &str,
    expiration_days: u64,
) -> anyhow::Result<RefreshToken> {
    let now = Utc::now();
    let expires_at = now + Duration::days(expiration_days as i64);
    let claims = RefreshClaims {
        sub: user_id,
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    let digest = digest_refresh_token(&token);

    Ok(RefreshToken {
        token,
        digest,
        expires_at,
    })
}

pub fn verify_access_token(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}

pub fn verify_refresh_token(token: &str, secret: &str) -> anyhow::Result<RefreshClaims> {
    let validation = Validation::default();
    let token_data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}

pub fn digest_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A refresh token is only honoured while its digest is the one stored on the
/// user; rotation and logout overwrite or clear the stored value.
pub fn refresh_token_matches(stored_digest: Option<&str>, presented_token: &str) -> bool {
    let Some(stored) = stored_digest else {
        return false;
    };
    let presented = digest_refresh_token(presented_token);
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

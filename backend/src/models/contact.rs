use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::validation::rules::validate_not_blank;

text_enum! {
    ContactStatus {
        New => "new",
        Read => "read",
        Replied => "replied",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    #[validate(length(min = 2, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub subject: String,
    #[validate(length(min = 10, max = 5_000))]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactCreatedResponse {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactRequest {
    pub status: Option<ContactStatus>,
    #[validate(length(max = 5_000))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyContactRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 20_000), custom(function = "validate_not_blank"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ContactListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ContactStats {
    pub total: i64,
    pub new: i64,
    pub read: i64,
    pub replied: i64,
    pub archived: i64,
    pub last_7_days: i64,
}

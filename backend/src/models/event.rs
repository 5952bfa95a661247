use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

use crate::{
    models::{form, media::ImageAsset},
    validation::rules::{validate_http_url, validate_not_blank, validate_tags},
};

text_enum! {
    EventStatus {
        Draft => "draft",
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub status: EventStatus,
    pub event_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: String,
    pub registration_link: Option<String>,
    pub max_participants: Option<i32>,
    pub image: Option<Json<ImageAsset>>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn image_public_id(&self) -> Option<String> {
        self.image.as_ref().map(|image| image.0.public_id.clone())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(min = 1, max = 10_000))]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub status: Option<EventStatus>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 300))]
    pub location: String,
    #[validate(custom(function = "validate_http_url"))]
    pub registration_link: Option<String>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    #[validate(range(min = 1))]
    pub max_participants: Option<i32>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10_000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub status: Option<EventStatus>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub event_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 300))]
    pub location: Option<String>,
    /// Empty string clears the link.
    pub registration_link: Option<String>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    #[validate(range(min = 1))]
    pub max_participants: Option<i32>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub upcoming: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

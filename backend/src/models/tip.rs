use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

use crate::{
    models::{form, media::ImageAsset},
    validation::rules::{validate_not_blank, validate_tags},
};

text_enum! {
    TipStatus {
        Draft => "draft",
        Published => "published",
    }
}

text_enum! {
    TipEventType {
        View => "view",
        Share => "share",
    }
}

text_enum! {
    TipSort {
        Latest => "latest",
        Popular => "popular",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tip {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<Json<ImageAsset>>,
    pub author_id: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub status: TipStatus,
    pub views: i64,
    pub unique_viewers: i64,
    pub shares: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tip {
    pub fn cover_public_id(&self) -> Option<String> {
        self.cover_image.as_ref().map(|image| image.0.public_id.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TipEvent {
    pub id: String,
    pub tip_id: String,
    pub event_type: TipEventType,
    pub platform: Option<String>,
    pub session_id: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTipRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub excerpt: String,
    #[validate(length(min = 1, max = 100_000))]
    pub content: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    pub status: Option<TipStatus>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTipRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, max = 100_000))]
    pub content: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    pub status: Option<TipStatus>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TrackViewRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackShareRequest {
    #[validate(length(min = 1, max = 30))]
    pub platform: String,
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TipListQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipCounters {
    pub views: i64,
    pub unique_viewers: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyViews {
    pub date: NaiveDate,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformShares {
    pub platform: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipAnalytics {
    pub tip_id: String,
    pub title: String,
    pub totals: TipCounters,
    pub daily_views: Vec<DailyViews>,
    pub shares_by_platform: Vec<PlatformShares>,
    pub recent_events: Vec<TipEvent>,
}

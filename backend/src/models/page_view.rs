use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageView {
    pub id: String,
    pub path: String,
    pub referrer: Option<String>,
    pub session_id: String,
    pub device: String,
    pub browser: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrackPageViewRequest {
    #[validate(length(min = 1, max = 2_048))]
    pub path: String,
    #[validate(length(max = 2_048))]
    pub referrer: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TrafficStatsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficBucket {
    pub bucket: DateTime<Utc>,
    pub views: i64,
    pub visitors: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficChange {
    pub views_percent: f64,
    pub visitors_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficStats {
    pub period: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_views: i64,
    pub unique_visitors: i64,
    pub change: TrafficChange,
    pub top_pages: Vec<LabelCount>,
    pub series: Vec<TrafficBucket>,
    pub devices: Vec<LabelCount>,
    pub browsers: Vec<LabelCount>,
    pub referrers: Vec<LabelCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeStats {
    pub active_visitors: i64,
    pub window_minutes: i64,
    pub pages: Vec<LabelCount>,
}

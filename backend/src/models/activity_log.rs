use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

text_enum! {
    ActivityAction {
        Login => "login",
        Logout => "logout",
        Register => "register",
        Create => "create",
        Update => "update",
        Delete => "delete",
        View => "view",
        Export => "export",
        Subscribe => "subscribe",
        Unsubscribe => "unsubscribe",
        Send => "send",
        Other => "other",
    }
}

text_enum! {
    ActivityModule {
        Auth => "auth",
        Users => "users",
        Events => "events",
        Gallery => "gallery",
        Projects => "projects",
        Team => "team",
        Contact => "contact",
        Settings => "settings",
        Newsletter => "newsletter",
        Tips => "tips",
        Traffic => "traffic",
        Home => "home",
        System => "system",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    /// User role, or `anonymous`.
    pub role: String,
    pub action: ActivityAction,
    pub module: ActivityModule,
    pub details: String,
    pub ip: Option<String>,
    pub method: String,
    pub url: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityLogQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub module: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityStatsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CountEntry {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityStats {
    pub days: i64,
    pub total: i64,
    pub by_action: Vec<CountEntry>,
    pub by_module: Vec<CountEntry>,
    pub by_day: Vec<DailyCount>,
}

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;

use crate::models::page_view::{LabelCount, PageView};

/// Column a traffic breakdown groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakdown {
    Device,
    Browser,
    Referrer,
}

impl Breakdown {
    fn expression(self) -> &'static str {
        match self {
            Breakdown::Device => "device",
            Breakdown::Browser => "browser",
            Breakdown::Referrer => "COALESCE(NULLIF(referrer, ''), 'direct')",
        }
    }
}

/// Bucket width for the time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketUnit {
    Hour,
    Day,
}

impl BucketUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            BucketUnit::Hour => "hour",
            BucketUnit::Day => "day",
        }
    }
}

pub async fn insert_page_view(pool: &PgPool, view: &PageView) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO page_views (id, path, referrer, session_id, device, browser, ip, \
         user_agent, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&view.id)
    .bind(&view.path)
    .bind(&view.referrer)
    .bind(&view.session_id)
    .bind(&view.device)
    .bind(&view.browser)
    .bind(&view.ip)
    .bind(&view.user_agent)
    .bind(view.created_at)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Total views and distinct sessions in `[from, to)`.
pub async fn totals(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*), COUNT(DISTINCT session_id) FROM page_views \
         WHERE created_at >= $1 AND created_at < $2",
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
}

pub async fn top_paths(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<LabelCount>, sqlx::Error> {
    sqlx::query_as::<_, LabelCount>(
        "SELECT path AS label, COUNT(*) AS count FROM page_views \
         WHERE created_at >= $1 AND created_at < $2 \
         GROUP BY path ORDER BY count DESC, label LIMIT $3",
    )
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn breakdown(
    pool: &PgPool,
    by: Breakdown,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<LabelCount>, sqlx::Error> {
    sqlx::query_as::<_, LabelCount>(&format!(
        "SELECT {} AS label, COUNT(*) AS count FROM page_views \
         WHERE created_at >= $1 AND created_at < $2 \
         GROUP BY label ORDER BY count DESC, label LIMIT $3",
        by.expression()
    ))
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Views and distinct sessions per bucket, keyed by the local wall-clock start
/// of the bucket in `time_zone`. Empty buckets are absent.
pub async fn bucket_counts(
    pool: &PgPool,
    unit: BucketUnit,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    time_zone: &str,
) -> Result<Vec<(NaiveDateTime, i64, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (NaiveDateTime, i64, i64)>(
        "SELECT date_trunc($1, created_at AT TIME ZONE $2) AS bucket, COUNT(*), \
         COUNT(DISTINCT session_id) FROM page_views \
         WHERE created_at >= $3 AND created_at < $4 GROUP BY bucket ORDER BY bucket",
    )
    .bind(unit.as_str())
    .bind(time_zone)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Sessions seen since `since`, grouped by the last page each one viewed.
pub async fn active_sessions_by_page(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<LabelCount>, sqlx::Error> {
    sqlx::query_as::<_, LabelCount>(
        "SELECT path AS label, COUNT(*) AS count FROM ( \
             SELECT DISTINCT ON (session_id) session_id, path FROM page_views \
             WHERE created_at >= $1 ORDER BY session_id, created_at DESC \
         ) AS latest GROUP BY path ORDER BY count DESC, label",
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referrer_breakdown_labels_missing_as_direct() {
        assert!(Breakdown::Referrer.expression().contains("'direct'"));
        assert_eq!(Breakdown::Device.expression(), "device");
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    models::activity_log::{
        ActivityAction, ActivityLog, ActivityModule, CountEntry, DailyCount,
    },
    repositories::common::push_clause,
};

const ACTIVITY_COLUMNS: &str = "id, user_id, user_name, user_email, role, action, module, details, \
     ip, method, url, status_code, response_time_ms, user_agent, created_at";

#[derive(Debug, Clone, Default)]
pub struct ActivityLogFilters {
    pub user_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub module: Option<ActivityModule>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn insert_activity_log(pool: &PgPool, log: &ActivityLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO activity_logs \
         (id, user_id, user_name, user_email, role, action, module, details, ip, method, url, \
         status_code, response_time_ms, user_agent, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(&log.id)
    .bind(&log.user_id)
    .bind(&log.user_name)
    .bind(&log.user_email)
    .bind(&log.role)
    .bind(log.action)
    .bind(log.module)
    .bind(&log.details)
    .bind(&log.ip)
    .bind(&log.method)
    .bind(&log.url)
    .bind(log.status_code)
    .bind(log.response_time_ms)
    .bind(&log.user_agent)
    .bind(log.created_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn list_activity_logs(
    pool: &PgPool,
    filters: &ActivityLogFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ActivityLog>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM activity_logs", ACTIVITY_COLUMNS));
    let mut has_clause = false;
    apply_activity_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder
        .build_query_as::<ActivityLog>()
        .fetch_all(pool)
        .await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM activity_logs");
    let mut count_has_clause = false;
    apply_activity_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn count_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM activity_logs WHERE created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await
}

pub async fn counts_by_action(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<CountEntry>, sqlx::Error> {
    sqlx::query_as::<_, CountEntry>(
        "SELECT action AS key, COUNT(*) AS count FROM activity_logs \
         WHERE created_at >= $1 GROUP BY action ORDER BY count DESC, key",
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

pub async fn counts_by_module(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<CountEntry>, sqlx::Error> {
    sqlx::query_as::<_, CountEntry>(
        "SELECT module AS key, COUNT(*) AS count FROM activity_logs \
         WHERE created_at >= $1 GROUP BY module ORDER BY count DESC, key",
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Per-day totals, bucketed by local date in `time_zone`.
pub async fn counts_by_day(
    pool: &PgPool,
    since: DateTime<Utc>,
    time_zone: &str,
) -> Result<Vec<DailyCount>, sqlx::Error> {
    sqlx::query_as::<_, DailyCount>(
        "SELECT (created_at AT TIME ZONE $2)::date AS date, COUNT(*) AS count \
         FROM activity_logs WHERE created_at >= $1 GROUP BY date ORDER BY date",
    )
    .bind(since)
    .bind(time_zone)
    .fetch_all(pool)
    .await
}

pub async fn delete_activity_logs_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM activity_logs WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn apply_activity_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &ActivityLogFilters,
) {
    if let Some(user_id) = filters.user_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("user_id = ").push_bind(user_id.clone());
    }
    if let Some(action) = filters.action {
        push_clause(builder, has_clause);
        builder.push("action = ").push_bind(action);
    }
    if let Some(module) = filters.module {
        push_clause(builder, has_clause);
        builder.push("module = ").push_bind(module);
    }
    if let Some(from) = filters.from {
        push_clause(builder, has_clause);
        builder.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        push_clause(builder, has_clause);
        builder.push("created_at <= ").push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_filters_default_all_none() {
        let filters = ActivityLogFilters::default();
        assert!(filters.user_id.is_none());
        assert!(filters.action.is_none());
        assert!(filters.module.is_none());
        assert!(filters.from.is_none());
        assert!(filters.to.is_none());
    }

    #[test]
    fn activity_filters_push_in_order() {
        let filters = ActivityLogFilters {
            user_id: Some("u1".into()),
            action: Some(ActivityAction::Create),
            module: Some(ActivityModule::Events),
            from: Some(Utc::now()),
            to: None,
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM activity_logs");
        let mut has_clause = false;
        apply_activity_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM activity_logs WHERE user_id = $1 AND action = $2 AND module = $3 \
             AND created_at >= $4"
        );
    }
}

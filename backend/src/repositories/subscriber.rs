use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::{
    models::subscriber::{NewsletterStats, PreferenceTopic, Subscriber, SubscriberStatus},
    repositories::common::{contains_pattern, push_clause},
};

const SUBSCRIBER_COLUMNS: &str = "id, email, name, status, preferences, unsubscribe_token, \
     source, subscribed_at, unsubscribed_at, last_email_sent_at, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct SubscriberFilters {
    pub status: Option<SubscriberStatus>,
    pub search: Option<String>,
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE email = $1",
        SUBSCRIBER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE id = $1",
        SUBSCRIBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE unsubscribe_token = $1",
        SUBSCRIBER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
}

pub async fn insert_subscriber(pool: &PgPool, subscriber: &Subscriber) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscribers (id, email, name, status, preferences, unsubscribe_token, \
         source, subscribed_at, unsubscribed_at, last_email_sent_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(&subscriber.id)
    .bind(&subscriber.email)
    .bind(&subscriber.name)
    .bind(subscriber.status)
    .bind(&subscriber.preferences)
    .bind(&subscriber.unsubscribe_token)
    .bind(&subscriber.source)
    .bind(subscriber.subscribed_at)
    .bind(subscriber.unsubscribed_at)
    .bind(subscriber.last_email_sent_at)
    .bind(subscriber.created_at)
    .bind(subscriber.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Writes every mutable column. The unsubscribe token is never rewritten.
pub async fn update_subscriber(
    pool: &PgPool,
    subscriber: &Subscriber,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE subscribers SET name = $2, status = $3, preferences = $4, source = $5, \
         subscribed_at = $6, unsubscribed_at = $7, updated_at = $8 WHERE id = $1",
    )
    .bind(&subscriber.id)
    .bind(&subscriber.name)
    .bind(subscriber.status)
    .bind(&subscriber.preferences)
    .bind(&subscriber.source)
    .bind(subscriber.subscribed_at)
    .bind(subscriber.unsubscribed_at)
    .bind(subscriber.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_status(
    pool: &PgPool,
    id: &str,
    status: SubscriberStatus,
) -> Result<Option<Subscriber>, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Subscriber>(&format!(
        "UPDATE subscribers SET status = $1, \
         unsubscribed_at = CASE WHEN $1 = 'unsubscribed' THEN COALESCE(unsubscribed_at, $2) \
         ELSE NULL END, updated_at = $2 WHERE id = $3 RETURNING {}",
        SUBSCRIBER_COLUMNS
    ))
    .bind(status)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_subscriber(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subscribers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_subscribers(
    pool: &PgPool,
    filters: &SubscriberFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Subscriber>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM subscribers", SUBSCRIBER_COLUMNS));
    let mut has_clause = false;
    apply_subscriber_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY subscribed_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder
        .build_query_as::<Subscriber>()
        .fetch_all(pool)
        .await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM subscribers");
    let mut count_has_clause = false;
    apply_subscriber_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

/// Everyone, newest first, for the CSV export.
pub async fn all_subscribers(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers ORDER BY subscribed_at DESC",
        SUBSCRIBER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Active subscribers opted in to `topic`.
pub async fn active_recipients(
    pool: &PgPool,
    topic: PreferenceTopic,
) -> Result<Vec<Subscriber>, sqlx::Error> {
    // Missing keys count as opted in, matching the preference defaults.
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE status = 'active' \
         AND COALESCE((preferences ->> $1)::boolean, TRUE) ORDER BY subscribed_at",
        SUBSCRIBER_COLUMNS
    ))
    .bind(topic.as_str())
    .fetch_all(pool)
    .await
}

pub async fn mark_emailed(
    pool: &PgPool,
    ids: &[String],
    sent_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("UPDATE subscribers SET last_email_sent_at = $1 WHERE id = ANY($2)")
        .bind(sent_at)
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn stats(pool: &PgPool, since: DateTime<Utc>) -> Result<NewsletterStats, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'active') AS active, \
         COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
         COUNT(*) FILTER (WHERE status = 'unsubscribed') AS unsubscribed, \
         COUNT(*) FILTER (WHERE status = 'bounced') AS bounced, \
         COUNT(*) FILTER (WHERE subscribed_at >= $1) AS recent \
         FROM subscribers",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(NewsletterStats {
        total: row.try_get("total")?,
        active: row.try_get("active")?,
        pending: row.try_get("pending")?,
        unsubscribed: row.try_get("unsubscribed")?,
        bounced: row.try_get("bounced")?,
        new_last_30_days: row.try_get("recent")?,
    })
}

fn apply_subscriber_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &SubscriberFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

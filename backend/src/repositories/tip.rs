use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgTransaction, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::tip::{Tip, TipCounters, TipEvent, TipEventType, TipSort, TipStatus},
    repositories::{
        common::{contains_pattern, push_clause},
        transaction::{begin_transaction, commit_transaction},
    },
};

const TIP_COLUMNS: &str = "id, title, slug, excerpt, content, cover_image, author_id, category, \
     tags, status, views, unique_viewers, shares, published_at, created_at, updated_at";

const TIP_EVENT_COLUMNS: &str =
    "id, tip_id, event_type, platform, session_id, referrer, user_agent, ip, created_at";

#[derive(Debug, Clone, Default)]
pub struct TipFilters {
    pub status: Option<TipStatus>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: Option<TipSort>,
}

/// Request metadata stored alongside a view or share.
#[derive(Debug, Clone, Default)]
pub struct TrackingContext {
    pub session_id: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

pub async fn list_tips(
    pool: &PgPool,
    filters: &TipFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Tip>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM tips", TIP_COLUMNS));
    let mut has_clause = false;
    apply_tip_filters(&mut builder, &mut has_clause, filters);
    match filters.sort.unwrap_or(TipSort::Latest) {
        TipSort::Popular => builder.push(" ORDER BY views DESC, shares DESC, id"),
        TipSort::Latest => {
            builder.push(" ORDER BY published_at DESC NULLS LAST, created_at DESC, id")
        }
    };
    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder.build_query_as::<Tip>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM tips");
    let mut count_has_clause = false;
    apply_tip_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Tip>, sqlx::Error> {
    sqlx::query_as::<_, Tip>(&format!("SELECT {} FROM tips WHERE id = $1", TIP_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_published_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Tip>, sqlx::Error> {
    sqlx::query_as::<_, Tip>(&format!(
        "SELECT {} FROM tips WHERE slug = LOWER($1) AND status = 'published'",
        TIP_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn slug_exists(
    pool: &PgPool,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM tips WHERE slug = $1 AND ($2::text IS NULL OR id <> $2))",
    )
    .bind(slug)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_tip(pool: &PgPool, tip: &Tip) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tips (id, title, slug, excerpt, content, cover_image, author_id, category, \
         tags, status, views, unique_viewers, shares, published_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(&tip.id)
    .bind(&tip.title)
    .bind(&tip.slug)
    .bind(&tip.excerpt)
    .bind(&tip.content)
    .bind(&tip.cover_image)
    .bind(&tip.author_id)
    .bind(&tip.category)
    .bind(&tip.tags)
    .bind(tip.status)
    .bind(tip.views)
    .bind(tip.unique_viewers)
    .bind(tip.shares)
    .bind(tip.published_at)
    .bind(tip.created_at)
    .bind(tip.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Writes the editable columns. Counters are owned by the tracking queries.
pub async fn update_tip(pool: &PgPool, tip: &Tip) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tips SET title = $2, slug = $3, excerpt = $4, content = $5, cover_image = $6, \
         category = $7, tags = $8, status = $9, published_at = $10, updated_at = $11 \
         WHERE id = $1",
    )
    .bind(&tip.id)
    .bind(&tip.title)
    .bind(&tip.slug)
    .bind(&tip.excerpt)
    .bind(&tip.content)
    .bind(&tip.cover_image)
    .bind(&tip.category)
    .bind(&tip.tags)
    .bind(tip.status)
    .bind(tip.published_at)
    .bind(tip.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn delete_tip(pool: &PgPool, id: &str) -> Result<Option<Tip>, sqlx::Error> {
    sqlx::query_as::<_, Tip>(&format!(
        "DELETE FROM tips WHERE id = $1 RETURNING {}",
        TIP_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn latest_published(pool: &PgPool, limit: i64) -> Result<Vec<Tip>, sqlx::Error> {
    sqlx::query_as::<_, Tip>(&format!(
        "SELECT {} FROM tips WHERE status = 'published' \
         ORDER BY published_at DESC NULLS LAST LIMIT $1",
        TIP_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Records a view of a published tip. The tip row is locked for the duration
/// of the transaction so two requests from one session cannot both count as
/// unique. Returns `None` when no published tip has the slug.
pub async fn track_view(
    pool: &PgPool,
    slug: &str,
    context: &TrackingContext,
) -> Result<Option<TipCounters>, AppError> {
    let mut tx = begin_transaction(pool).await?;

    let tip_id = sqlx::query_scalar::<_, String>(
        "SELECT id FROM tips WHERE slug = LOWER($1) AND status = 'published' FOR UPDATE",
    )
    .bind(slug)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(tip_id) = tip_id else {
        return Ok(None);
    };

    let first_view = match context.session_id.as_deref() {
        Some(session_id) => !sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tip_events WHERE tip_id = $1 AND event_type = 'view' \
             AND session_id = $2)",
        )
        .bind(&tip_id)
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?,
        None => false,
    };

    insert_event(&mut tx, &tip_id, TipEventType::View, None, context).await?;

    let counters = sqlx::query_as::<_, (i64, i64, i64)>(
        "UPDATE tips SET views = views + 1, unique_viewers = unique_viewers + $2 \
         WHERE id = $1 RETURNING views, unique_viewers, shares",
    )
    .bind(&tip_id)
    .bind(i64::from(first_view))
    .fetch_one(&mut *tx)
    .await?;

    commit_transaction(tx).await?;
    Ok(Some(counters_from(counters)))
}

/// Records a share of a published tip. Returns `None` for unknown slugs.
pub async fn track_share(
    pool: &PgPool,
    slug: &str,
    platform: &str,
    context: &TrackingContext,
) -> Result<Option<TipCounters>, AppError> {
    let mut tx = begin_transaction(pool).await?;

    let counters = sqlx::query_as::<_, (String, i64, i64, i64)>(
        "UPDATE tips SET shares = shares + 1 WHERE slug = LOWER($1) AND status = 'published' \
         RETURNING id, views, unique_viewers, shares",
    )
    .bind(slug)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((tip_id, views, unique_viewers, shares)) = counters else {
        return Ok(None);
    };

    insert_event(&mut tx, &tip_id, TipEventType::Share, Some(platform), context).await?;
    commit_transaction(tx).await?;
    Ok(Some(counters_from((views, unique_viewers, shares))))
}

/// Views per local calendar day since `since`, for days that had any.
pub async fn daily_view_counts(
    pool: &PgPool,
    tip_id: &str,
    since: DateTime<Utc>,
    time_zone: &str,
) -> Result<Vec<(NaiveDate, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (NaiveDate, i64)>(
        "SELECT (created_at AT TIME ZONE $3)::date AS day, COUNT(*) AS count FROM tip_events \
         WHERE tip_id = $1 AND event_type = 'view' AND created_at >= $2 \
         GROUP BY day ORDER BY day",
    )
    .bind(tip_id)
    .bind(since)
    .bind(time_zone)
    .fetch_all(pool)
    .await
}

pub async fn share_platforms(pool: &PgPool, tip_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT COALESCE(platform, 'unknown') FROM tip_events \
         WHERE tip_id = $1 AND event_type = 'share'",
    )
    .bind(tip_id)
    .fetch_all(pool)
    .await
}

pub async fn recent_events(
    pool: &PgPool,
    tip_id: &str,
    limit: i64,
) -> Result<Vec<TipEvent>, sqlx::Error> {
    sqlx::query_as::<_, TipEvent>(&format!(
        "SELECT {} FROM tip_events WHERE tip_id = $1 ORDER BY created_at DESC LIMIT $2",
        TIP_EVENT_COLUMNS
    ))
    .bind(tip_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

async fn insert_event(
    tx: &mut PgTransaction<'static>,
    tip_id: &str,
    event_type: TipEventType,
    platform: Option<&str>,
    context: &TrackingContext,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tip_events (id, tip_id, event_type, platform, session_id, referrer, \
         user_agent, ip, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tip_id)
    .bind(event_type)
    .bind(platform)
    .bind(&context.session_id)
    .bind(&context.referrer)
    .bind(&context.user_agent)
    .bind(&context.ip)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map(|_| ())
}

fn counters_from((views, unique_viewers, shares): (i64, i64, i64)) -> TipCounters {
    TipCounters {
        views,
        unique_viewers,
        shares,
    }
}

fn apply_tip_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &TipFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(category) = filters.category.as_ref() {
        push_clause(builder, has_clause);
        builder.push("category = ").push_bind(category.clone());
    }
    if let Some(tag) = filters.tag.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("LOWER(")
            .push_bind(tag.clone())
            .push(") = ANY(SELECT LOWER(t) FROM unnest(tags) AS t)");
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR excerpt ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_filter_is_case_insensitive() {
        let filters = TipFilters {
            status: Some(TipStatus::Published),
            tag: Some("Rust".into()),
            ..Default::default()
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM tips");
        let mut has_clause = false;
        apply_tip_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM tips WHERE status = $1 AND \
             LOWER($2) = ANY(SELECT LOWER(t) FROM unnest(tags) AS t)"
        );
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    models::event::{Event, EventStatus},
    repositories::common::{contains_pattern, push_clause},
};

const EVENT_COLUMNS: &str = "id, title, slug, description, category, status, event_date, end_date, \
     location, registration_link, max_participants, image, tags, is_featured, created_by, \
     created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub category: Option<String>,
    pub status: Option<EventStatus>,
    /// Public listings never include drafts.
    pub exclude_drafts: bool,
    /// `Some(true)`: starting from `now`; `Some(false)`: already started.
    pub upcoming: Option<bool>,
    pub now: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

pub async fn list_events(
    pool: &PgPool,
    filters: &EventFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Event>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM events", EVENT_COLUMNS));
    let mut has_clause = false;
    apply_event_filters(&mut builder, &mut has_clause, filters);
    if filters.upcoming == Some(true) {
        builder.push(" ORDER BY event_date ASC, id");
    } else {
        builder.push(" ORDER BY event_date DESC, id");
    }
    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder.build_query_as::<Event>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM events");
    let mut count_has_clause = false;
    apply_event_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id_or_slug(pool: &PgPool, key: &str) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!(
        "SELECT {} FROM events WHERE id = $1 OR slug = LOWER($1) LIMIT 1",
        EVENT_COLUMNS
    ))
    .bind(key)
    .fetch_optional(pool)
    .await
}

pub async fn slug_exists(
    pool: &PgPool,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM events WHERE slug = $1 AND ($2::text IS NULL OR id <> $2))",
    )
    .bind(slug)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_event(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO events (id, title, slug, description, category, status, event_date, \
         end_date, location, registration_link, max_participants, image, tags, is_featured, \
         created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.slug)
    .bind(&event.description)
    .bind(&event.category)
    .bind(event.status)
    .bind(event.event_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(&event.registration_link)
    .bind(event.max_participants)
    .bind(&event.image)
    .bind(&event.tags)
    .bind(event.is_featured)
    .bind(&event.created_by)
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_event(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE events SET title = $2, slug = $3, description = $4, category = $5, status = $6, \
         event_date = $7, end_date = $8, location = $9, registration_link = $10, \
         max_participants = $11, image = $12, tags = $13, is_featured = $14, updated_at = $15 \
         WHERE id = $1",
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.slug)
    .bind(&event.description)
    .bind(&event.category)
    .bind(event.status)
    .bind(event.event_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(&event.registration_link)
    .bind(event.max_participants)
    .bind(&event.image)
    .bind(&event.tags)
    .bind(event.is_featured)
    .bind(event.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn delete_event(pool: &PgPool, id: &str) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!(
        "DELETE FROM events WHERE id = $1 RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn upcoming_events(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!(
        "SELECT {} FROM events WHERE status IN ('upcoming', 'ongoing') AND event_date >= $1 \
         ORDER BY event_date ASC LIMIT $2",
        EVENT_COLUMNS
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

fn apply_event_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &EventFilters,
) {
    if filters.exclude_drafts {
        push_clause(builder, has_clause);
        builder.push("status <> 'draft'");
    }
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(category) = filters.category.as_ref() {
        push_clause(builder, has_clause);
        builder.push("category = ").push_bind(category.clone());
    }
    if let Some(upcoming) = filters.upcoming {
        let now = filters.now.unwrap_or_else(Utc::now);
        push_clause(builder, has_clause);
        if upcoming {
            builder.push("event_date >= ").push_bind(now);
        } else {
            builder.push("event_date < ").push_bind(now);
        }
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR location ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::{
    models::contact::{Contact, ContactStats, ContactStatus},
    repositories::common::{contains_pattern, push_clause},
};

const CONTACT_COLUMNS: &str = "id, name, email, phone, subject, message, status, admin_notes, ip, \
     user_agent, read_at, replied_at, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct ContactFilters {
    pub status: Option<ContactStatus>,
    pub search: Option<String>,
}

pub async fn insert_contact(pool: &PgPool, contact: &Contact) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO contacts (id, name, email, phone, subject, message, status, admin_notes, \
         ip, user_agent, read_at, replied_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(&contact.id)
    .bind(&contact.name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.subject)
    .bind(&contact.message)
    .bind(contact.status)
    .bind(&contact.admin_notes)
    .bind(&contact.ip)
    .bind(&contact.user_agent)
    .bind(contact.read_at)
    .bind(contact.replied_at)
    .bind(contact.created_at)
    .bind(contact.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn list_contacts(
    pool: &PgPool,
    filters: &ContactFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Contact>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM contacts", CONTACT_COLUMNS));
    let mut has_clause = false;
    apply_contact_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder.build_query_as::<Contact>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM contacts");
    let mut count_has_clause = false;
    apply_contact_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        "SELECT {} FROM contacts WHERE id = $1",
        CONTACT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Flips a `new` message to `read`; any other status is left as is.
pub async fn mark_read(
    pool: &PgPool,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(&format!(
        "UPDATE contacts SET status = CASE WHEN status = 'new' THEN 'read' ELSE status END, \
         read_at = COALESCE(read_at, $1), updated_at = CASE WHEN status = 'new' THEN $1 \
         ELSE updated_at END WHERE id = $2 RETURNING {}",
        CONTACT_COLUMNS
    ))
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_contact(
    pool: &PgPool,
    id: &str,
    status: Option<ContactStatus>,
    admin_notes: Option<&str>,
) -> Result<Option<Contact>, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Contact>(&format!(
        "UPDATE contacts SET status = COALESCE($1, status), \
         admin_notes = COALESCE($2, admin_notes), \
         read_at = CASE WHEN $1 IS NOT NULL AND $1 <> 'new' THEN COALESCE(read_at, $3) \
         ELSE read_at END, \
         replied_at = CASE WHEN $1 = 'replied' THEN COALESCE(replied_at, $3) ELSE replied_at END, \
         updated_at = $3 WHERE id = $4 RETURNING {}",
        CONTACT_COLUMNS
    ))
    .bind(status)
    .bind(admin_notes)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_replied(pool: &PgPool, id: &str) -> Result<Option<Contact>, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Contact>(&format!(
        "UPDATE contacts SET status = 'replied', replied_at = $1, \
         read_at = COALESCE(read_at, $1), updated_at = $1 WHERE id = $2 RETURNING {}",
        CONTACT_COLUMNS
    ))
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_contact(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn stats(pool: &PgPool, since: DateTime<Utc>) -> Result<ContactStats, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'new') AS new, \
         COUNT(*) FILTER (WHERE status = 'read') AS read, \
         COUNT(*) FILTER (WHERE status = 'replied') AS replied, \
         COUNT(*) FILTER (WHERE status = 'archived') AS archived, \
         COUNT(*) FILTER (WHERE created_at >= $1) AS recent \
         FROM contacts",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(ContactStats {
        total: row.try_get("total")?,
        new: row.try_get("new")?,
        read: row.try_get("read")?,
        replied: row.try_get("replied")?,
        archived: row.try_get("archived")?,
        last_7_days: row.try_get("recent")?,
    })
}

fn apply_contact_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &ContactFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR subject ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

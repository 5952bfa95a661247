use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    models::team::{ReorderItem, TeamMember, TeamStatus},
    repositories::{
        common::push_clause,
        transaction::{begin_transaction, commit_transaction},
    },
    error::AppError,
};

const TEAM_COLUMNS: &str = "id, name, position, department, bio, email, image, social, \
     display_order, year, status, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct TeamFilters {
    pub department: Option<String>,
    pub year: Option<i32>,
    pub status: Option<TeamStatus>,
}

pub async fn list_members(
    pool: &PgPool,
    filters: &TeamFilters,
) -> Result<Vec<TeamMember>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM team_members", TEAM_COLUMNS));
    let mut has_clause = false;
    if let Some(status) = filters.status {
        push_clause(&mut builder, &mut has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(department) = filters.department.as_ref() {
        push_clause(&mut builder, &mut has_clause);
        builder
            .push("LOWER(department) = LOWER(")
            .push_bind(department.clone())
            .push(")");
    }
    if let Some(year) = filters.year {
        push_clause(&mut builder, &mut has_clause);
        builder.push("year = ").push_bind(year);
    }
    builder.push(" ORDER BY display_order ASC, name ASC");
    builder
        .build_query_as::<TeamMember>()
        .fetch_all(pool)
        .await
}

pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM team_members WHERE status = 'active'")
        .fetch_one(pool)
        .await
}

pub async fn next_display_order(pool: &PgPool) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT COALESCE(MAX(display_order), 0) + 1 FROM team_members")
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(&format!(
        "SELECT {} FROM team_members WHERE id = $1",
        TEAM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_member(pool: &PgPool, member: &TeamMember) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO team_members (id, name, position, department, bio, email, image, social, \
         display_order, year, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(&member.id)
    .bind(&member.name)
    .bind(&member.position)
    .bind(&member.department)
    .bind(&member.bio)
    .bind(&member.email)
    .bind(&member.image)
    .bind(&member.social)
    .bind(member.display_order)
    .bind(member.year)
    .bind(member.status)
    .bind(member.created_at)
    .bind(member.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_member(pool: &PgPool, member: &TeamMember) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE team_members SET name = $2, position = $3, department = $4, bio = $5, \
         email = $6, image = $7, social = $8, display_order = $9, year = $10, status = $11, \
         updated_at = $12 WHERE id = $1",
    )
    .bind(&member.id)
    .bind(&member.name)
    .bind(&member.position)
    .bind(&member.department)
    .bind(&member.bio)
    .bind(&member.email)
    .bind(&member.image)
    .bind(&member.social)
    .bind(member.display_order)
    .bind(member.year)
    .bind(member.status)
    .bind(member.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn delete_member(pool: &PgPool, id: &str) -> Result<Option<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(&format!(
        "DELETE FROM team_members WHERE id = $1 RETURNING {}",
        TEAM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Applies every new display order in one transaction. Returns how many rows
/// matched.
pub async fn reorder(pool: &PgPool, items: &[ReorderItem]) -> Result<u64, AppError> {
    let mut tx = begin_transaction(pool).await?;
    let now = Utc::now();
    let mut updated = 0;
    for item in items {
        let result = sqlx::query(
            "UPDATE team_members SET display_order = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(item.display_order)
        .bind(now)
        .bind(&item.id)
        .execute(&mut *tx)
        .await?;
        updated += result.rows_affected();
    }
    commit_transaction(tx).await?;
    Ok(updated)
}

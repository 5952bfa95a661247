use chrono::Utc;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::{
    models::user::{User, UserRole},
    repositories::common::{contains_pattern, push_clause},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, avatar_url, is_active, \
     refresh_token_hash, last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct UserFilters {
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn insert_user<'e, E>(executor: E, user: &User) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, avatar_url, is_active, \
         refresh_token_hash, last_login_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(&user.avatar_url)
    .bind(user.is_active)
    .bind(&user.refresh_token_hash)
    .bind(user.last_login_at)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Inserts a self-registered account. The first account on an empty table
/// becomes admin; the table lock serializes concurrent registrations so at
/// most one of them can observe the empty table.
pub async fn insert_registered_user(pool: &PgPool, user: &mut User) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;
    let has_users: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users)")
        .fetch_one(&mut *tx)
        .await?;

    user.role = if has_users {
        UserRole::Member
    } else {
        UserRole::Admin
    };
    insert_user(&mut *tx, user).await?;

    tx.commit().await
}

/// Stores the digest of a newly issued refresh token and stamps the login.
pub async fn record_login(pool: &PgPool, id: &str, digest: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE users SET refresh_token_hash = $1, last_login_at = $2, updated_at = $2 \
         WHERE id = $3",
    )
    .bind(digest)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .map(|_| ())
}

/// Replaces the stored refresh digest only when it still equals `expected`,
/// so two concurrent refreshes of the same token cannot both succeed.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    id: &str,
    expected: &str,
    next: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET refresh_token_hash = $1, updated_at = $2 \
         WHERE id = $3 AND refresh_token_hash = $4",
    )
    .bind(next)
    .bind(Utc::now())
    .bind(id)
    .bind(expected)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn clear_refresh_token(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET refresh_token_hash = NULL, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .map(|_| ())
}

/// Sets a new password hash and revokes the stored refresh token.
pub async fn update_password(pool: &PgPool, id: &str, hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET password_hash = $1, refresh_token_hash = NULL, updated_at = $2 \
         WHERE id = $3",
    )
    .bind(hash)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_profile(
    pool: &PgPool,
    id: &str,
    name: Option<&str>,
    email: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = COALESCE($1, name), email = COALESCE($2, email), \
         avatar_url = COALESCE($3, avatar_url), updated_at = $4 WHERE id = $5 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(name)
    .bind(email)
    .bind(avatar_url)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn update_role(pool: &PgPool, id: &str, role: UserRole) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET role = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(role)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Deactivating a user also revokes their refresh token.
pub async fn update_status(pool: &PgPool, id: &str, is_active: bool) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $1, \
         refresh_token_hash = CASE WHEN $1 THEN refresh_token_hash ELSE NULL END, \
         updated_at = $2 WHERE id = $3 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(is_active)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn delete_user(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_users(
    pool: &PgPool,
    filters: &UserFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
    let mut has_clause = false;
    apply_user_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder.build_query_as::<User>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
    let mut count_has_clause = false;
    apply_user_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

fn apply_user_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &UserFilters,
) {
    if let Some(role) = filters.role {
        push_clause(builder, has_clause);
        builder.push("role = ").push_bind(role);
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_filters_build_where_clause() {
        let filters = UserFilters {
            role: Some(UserRole::Admin),
            search: Some("ada".into()),
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM users");
        let mut has_clause = false;
        apply_user_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM users WHERE role = $1 AND (name ILIKE $2 OR email ILIKE $3)"
        );
    }
}

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    models::project::{Project, ProjectStatus},
    repositories::common::{contains_pattern, push_clause},
};

const PROJECT_COLUMNS: &str = "id, title, slug, description, content, tech_stack, status, \
     github_url, live_url, image, team_members, is_featured, created_by, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct ProjectFilters {
    pub status: Option<ProjectStatus>,
    pub exclude_drafts: bool,
    /// Case-insensitive match against any tech stack entry.
    pub tech: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}

pub async fn list_projects(
    pool: &PgPool,
    filters: &ProjectFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Project>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM projects", PROJECT_COLUMNS));
    let mut has_clause = false;
    apply_project_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY is_featured DESC, created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder.build_query_as::<Project>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM projects");
    let mut count_has_clause = false;
    apply_project_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE id = $1",
        PROJECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id_or_slug(pool: &PgPool, key: &str) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE id = $1 OR slug = LOWER($1) LIMIT 1",
        PROJECT_COLUMNS
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
        "SELECT EXISTS(SELECT 1 FROM projects WHERE slug = $1 AND ($2::text IS NULL OR id <> $2))",
    )
    .bind(slug)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_project(pool: &PgPool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO projects (id, title, slug, description, content, tech_stack, status, \
         github_url, live_url, image, team_members, is_featured, created_by, created_at, \
         updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(&project.slug)
    .bind(&project.description)
    .bind(&project.content)
    .bind(&project.tech_stack)
    .bind(project.status)
    .bind(&project.github_url)
    .bind(&project.live_url)
    .bind(&project.image)
    .bind(&project.team_members)
    .bind(project.is_featured)
    .bind(&project.created_by)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_project(pool: &PgPool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE projects SET title = $2, slug = $3, description = $4, content = $5, \
         tech_stack = $6, status = $7, github_url = $8, live_url = $9, image = $10, \
         team_members = $11, is_featured = $12, updated_at = $13 WHERE id = $1",
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(&project.slug)
    .bind(&project.description)
    .bind(&project.content)
    .bind(&project.tech_stack)
    .bind(project.status)
    .bind(&project.github_url)
    .bind(&project.live_url)
    .bind(&project.image)
    .bind(&project.team_members)
    .bind(project.is_featured)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn delete_project(pool: &PgPool, id: &str) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "DELETE FROM projects WHERE id = $1 RETURNING {}",
        PROJECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn featured_projects(pool: &PgPool, limit: i64) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {} FROM projects WHERE status <> 'draft' AND is_featured \
         ORDER BY created_at DESC LIMIT $1",
        PROJECT_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

fn apply_project_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &ProjectFilters,
) {
    if filters.exclude_drafts {
        push_clause(builder, has_clause);
        builder.push("status <> 'draft'");
    }
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(tech) = filters.tech.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("EXISTS (SELECT 1 FROM unnest(tech_stack) AS t WHERE LOWER(t) = LOWER(")
            .push_bind(tech.clone())
            .push("))");
    }
    if let Some(featured) = filters.featured {
        push_clause(builder, has_clause);
        builder.push("is_featured = ").push_bind(featured);
    }
    if let Some(search) = filters.search.as_deref() {
        let pattern = contains_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tech_filter_matches_array_entries() {
        let filters = ProjectFilters {
            exclude_drafts: true,
            tech: Some("Rust".into()),
            ..Default::default()
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM projects");
        let mut has_clause = false;
        apply_project_filters(&mut builder, &mut has_clause, &filters);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM projects WHERE status <> 'draft' AND \
             EXISTS (SELECT 1 FROM unnest(tech_stack) AS t WHERE LOWER(t) = LOWER($1))"
        );
    }
}

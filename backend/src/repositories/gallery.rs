use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    models::gallery::{CategoryCount, GalleryItem, GalleryStatus},
    repositories::common::push_clause,
};

const GALLERY_COLUMNS: &str = "id, title, description, category, status, images, event_id, \
     taken_at, tags, is_featured, created_by, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct GalleryFilters {
    pub category: Option<String>,
    pub event_id: Option<String>,
    pub status: Option<GalleryStatus>,
}

pub async fn list_items(
    pool: &PgPool,
    filters: &GalleryFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<GalleryItem>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM gallery_items", GALLERY_COLUMNS));
    let mut has_clause = false;
    apply_gallery_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY COALESCE(taken_at, created_at) DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = builder
        .build_query_as::<GalleryItem>()
        .fetch_all(pool)
        .await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM gallery_items");
    let mut count_has_clause = false;
    apply_gallery_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn published_categories(pool: &PgPool) -> Result<Vec<CategoryCount>, sqlx::Error> {
    sqlx::query_as::<_, CategoryCount>(
        "SELECT category, COUNT(*) AS count FROM gallery_items WHERE status = 'published' \
         GROUP BY category ORDER BY category",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(&format!(
        "SELECT {} FROM gallery_items WHERE id = $1",
        GALLERY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_item(pool: &PgPool, item: &GalleryItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO gallery_items (id, title, description, category, status, images, event_id, \
         taken_at, tags, is_featured, created_by, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(&item.id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.category)
    .bind(item.status)
    .bind(&item.images)
    .bind(&item.event_id)
    .bind(item.taken_at)
    .bind(&item.tags)
    .bind(item.is_featured)
    .bind(&item.created_by)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn update_item(pool: &PgPool, item: &GalleryItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE gallery_items SET title = $2, description = $3, category = $4, status = $5, \
         images = $6, event_id = $7, taken_at = $8, tags = $9, is_featured = $10, \
         updated_at = $11 WHERE id = $1",
    )
    .bind(&item.id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.category)
    .bind(item.status)
    .bind(&item.images)
    .bind(&item.event_id)
    .bind(item.taken_at)
    .bind(&item.tags)
    .bind(item.is_featured)
    .bind(item.updated_at)
    .execute(pool)
    .await
    .map(|_| ())
}

pub async fn delete_item(pool: &PgPool, id: &str) -> Result<Option<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(&format!(
        "DELETE FROM gallery_items WHERE id = $1 RETURNING {}",
        GALLERY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn recent_published(pool: &PgPool, limit: i64) -> Result<Vec<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(&format!(
        "SELECT {} FROM gallery_items WHERE status = 'published' \
         ORDER BY created_at DESC LIMIT $1",
        GALLERY_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

fn apply_gallery_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &GalleryFilters,
) {
    if let Some(status) = filters.status {
        push_clause(builder, has_clause);
        builder.push("status = ").push_bind(status);
    }
    if let Some(category) = filters.category.as_ref() {
        push_clause(builder, has_clause);
        builder.push("category = ").push_bind(category.clone());
    }
    if let Some(event_id) = filters.event_id.as_ref() {
        push_clause(builder, has_clause);
        builder.push("event_id = ").push_bind(event_id.clone());
    }
}

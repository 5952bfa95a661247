use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json as DbJson;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::common::{discard_images, parse_filter, trimmed, upload_images, ContentForm},
    models::{
        gallery::{
            partition_images, CategoryCount, CreateGalleryRequest, GalleryItem,
            GalleryItemResponse, GalleryListQuery, GalleryStatus, UpdateGalleryRequest,
        },
        media::ImageView,
        pagination::{Paginated, Pagination},
        user::User,
    },
    repositories::gallery::{self as gallery_repo, GalleryFilters},
    services::media::thumbnail_url,
    state::AppState,
};

const IMAGE_FOLDER: &str = "gallery";
const IMAGES_FIELD: &str = "images";
const MAX_IMAGES_PER_REQUEST: usize = 20;
const THUMBNAIL_WIDTH: u32 = 400;
const THUMBNAIL_HEIGHT: u32 = 300;

pub fn gallery_response(item: GalleryItem, cloud_name: &str) -> GalleryItemResponse {
    let images = item
        .images
        .0
        .into_iter()
        .map(|image| ImageView {
            thumbnail_url: thumbnail_url(cloud_name, &image, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT),
            url: image.url,
            public_id: image.public_id,
        })
        .collect();
    GalleryItemResponse {
        id: item.id,
        title: item.title,
        description: item.description,
        category: item.category,
        status: item.status,
        images,
        event_id: item.event_id,
        taken_at: item.taken_at,
        tags: item.tags,
        is_featured: item.is_featured,
        created_by: item.created_by,
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

pub async fn list_gallery(
    State(state): State<AppState>,
    Query(q): Query<GalleryListQuery>,
) -> Result<Json<Paginated<GalleryItemResponse>>, AppError> {
    let filters = GalleryFilters {
        category: trimmed(q.category),
        event_id: trimmed(q.event_id),
        status: Some(GalleryStatus::Published),
    };
    list(&state, filters, q.page, q.limit).await.map(Json)
}

pub async fn admin_list_gallery(
    State(state): State<AppState>,
    Query(q): Query<GalleryListQuery>,
) -> Result<Json<Paginated<GalleryItemResponse>>, AppError> {
    let filters = GalleryFilters {
        category: trimmed(q.category),
        event_id: trimmed(q.event_id),
        status: parse_filter(q.status.as_deref(), "status")?,
    };
    list(&state, filters, q.page, q.limit).await.map(Json)
}

async fn list(
    state: &AppState,
    filters: GalleryFilters,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Paginated<GalleryItemResponse>, AppError> {
    let pagination = Pagination::new(page, limit);
    let (items, total) =
        gallery_repo::list_items(&state.pool, &filters, pagination.limit, pagination.offset())
            .await?;
    let cloud_name = state.config.media_cloud_name.as_str();
    Ok(Paginated::new(items, pagination, total).map(|item| gallery_response(item, cloud_name)))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    Ok(Json(gallery_repo::published_categories(&state.pool).await?))
}

pub async fn get_gallery_item(
    State(state): State<AppState>,
    viewer: Option<Extension<User>>,
    Path(id): Path<String>,
) -> Result<Json<GalleryItemResponse>, AppError> {
    let is_admin = viewer.map(|Extension(user)| user.is_admin()).unwrap_or(false);
    let item = gallery_repo::find_by_id(&state.pool, &id)
        .await?
        .filter(|item| is_admin || item.status == GalleryStatus::Published)
        .ok_or_else(|| AppError::NotFound("Gallery item not found".into()))?;
    Ok(Json(gallery_response(item, &state.config.media_cloud_name)))
}

pub async fn create_gallery_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut form: ContentForm,
) -> Result<(StatusCode, Json<GalleryItemResponse>), AppError> {
    let payload: CreateGalleryRequest = form.payload()?;
    let files = form.take_files(IMAGES_FIELD);
    if files.is_empty() {
        return Err(AppError::BadRequest("At least one image is required".into()));
    }
    ensure_upload_count(files.len())?;

    let images = upload_images(&state, files, IMAGE_FOLDER).await?;
    let now = Utc::now();
    let item = GalleryItem {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        description: trimmed(payload.description),
        category: payload.category.trim().to_lowercase(),
        status: payload.status.unwrap_or(GalleryStatus::Published),
        images: DbJson(images),
        event_id: trimmed(payload.event_id),
        taken_at: payload.taken_at,
        tags: payload.tags.unwrap_or_default(),
        is_featured: payload.is_featured.unwrap_or(false),
        created_by: Some(user.id),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = gallery_repo::insert_item(&state.pool, &item).await {
        discard_images(&state, public_ids(&item));
        return Err(err.into());
    }
    Ok((
        StatusCode::CREATED,
        Json(gallery_response(item, &state.config.media_cloud_name)),
    ))
}

pub async fn update_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: ContentForm,
) -> Result<Json<GalleryItemResponse>, AppError> {
    let payload: UpdateGalleryRequest = form.payload()?;
    let mut item = gallery_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gallery item not found".into()))?;

    if let Some(title) = payload.title {
        item.title = title.trim().to_string();
    }
    if payload.description.is_some() {
        item.description = trimmed(payload.description);
    }
    if let Some(category) = payload.category {
        item.category = category.trim().to_lowercase();
    }
    if let Some(status) = payload.status {
        item.status = status;
    }
    if payload.event_id.is_some() {
        item.event_id = trimmed(payload.event_id);
    }
    if payload.taken_at.is_some() {
        item.taken_at = payload.taken_at;
    }
    if let Some(tags) = payload.tags {
        item.tags = tags;
    }
    if let Some(is_featured) = payload.is_featured {
        item.is_featured = is_featured;
    }

    let remove = payload.remove_images.unwrap_or_default();
    let (mut kept, removed) = partition_images(std::mem::take(&mut item.images.0), &remove);

    let files = form.take_files(IMAGES_FIELD);
    ensure_upload_count(files.len())?;
    let added = upload_images(&state, files, IMAGE_FOLDER).await?;
    let added_ids: Vec<String> = added.iter().map(|image| image.public_id.clone()).collect();
    kept.extend(added);
    item.images = DbJson(kept);
    item.updated_at = Utc::now();

    if let Err(err) = gallery_repo::update_item(&state.pool, &item).await {
        discard_images(&state, added_ids);
        return Err(err.into());
    }
    discard_images(&state, removed);
    Ok(Json(gallery_response(item, &state.config.media_cloud_name)))
}

pub async fn delete_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let item = gallery_repo::delete_item(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gallery item not found".into()))?;
    discard_images(&state, public_ids(&item));
    Ok(Json(json!({ "message": "Gallery item deleted" })))
}

fn public_ids(item: &GalleryItem) -> Vec<String> {
    item.images
        .0
        .iter()
        .map(|image| image.public_id.clone())
        .collect()
}

fn ensure_upload_count(count: usize) -> Result<(), AppError> {
    if count > MAX_IMAGES_PER_REQUEST {
        return Err(AppError::BadRequest(format!(
            "At most {} images can be uploaded at once",
            MAX_IMAGES_PER_REQUEST
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::ImageAsset;

    #[test]
    fn response_carries_thumbnail_per_image() {
        let now = Utc::now();
        let item = GalleryItem {
            id: "g1".into(),
            title: "Hack night".into(),
            description: None,
            category: "events".into(),
            status: GalleryStatus::Published,
            images: DbJson(vec![ImageAsset {
                url: "https://cdn.test/a.jpg".into(),
                public_id: "club/gallery/a".into(),
            }]),
            event_id: None,
            taken_at: None,
            tags: vec![],
            is_featured: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let response = gallery_response(item, "demo");
        assert_eq!(response.images.len(), 1);
        assert!(response.images[0]
            .thumbnail_url
            .contains("/demo/image/upload/c_fill,w_400,h_300"));
        assert_eq!(response.images[0].url, "https://cdn.test/a.jpg");
    }

    #[test]
    fn upload_count_is_capped() {
        assert!(ensure_upload_count(MAX_IMAGES_PER_REQUEST).is_ok());
        assert!(ensure_upload_count(MAX_IMAGES_PER_REQUEST + 1).is_err());
    }
}

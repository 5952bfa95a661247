use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

use crate::{
    models::{
        form,
        media::{ImageAsset, ImageView},
    },
    validation::rules::{validate_not_blank, validate_tags},
};

text_enum! {
    GalleryStatus {
        Draft => "draft",
        Published => "published",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GalleryItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: GalleryStatus,
    pub images: Json<Vec<ImageAsset>>,
    pub event_id: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryItemResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: GalleryStatus,
    pub images: Vec<ImageView>,
    pub event_id: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGalleryRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(max = 5_000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub status: Option<GalleryStatus>,
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateGalleryRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 5_000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub status: Option<GalleryStatus>,
    /// Empty string detaches the event.
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "form::datetime_opt")]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
    /// Public ids of images to drop from the item.
    #[serde(default, deserialize_with = "form::list_opt")]
    pub remove_images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct GalleryListQuery {
    pub category: Option<String>,
    pub event_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Splits the current images into those kept and the public ids removed.
pub fn partition_images(
    current: Vec<ImageAsset>,
    remove: &[String],
) -> (Vec<ImageAsset>, Vec<String>) {
    let mut kept = Vec::with_capacity(current.len());
    let mut removed = Vec::new();
    for image in current {
        if remove.iter().any(|id| id == &image.public_id) {
            removed.push(image.public_id);
        } else {
            kept.push(image);
        }
    }
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str) -> ImageAsset {
        ImageAsset {
            url: format!("https://cdn.test/{}.jpg", id),
            public_id: id.to_string(),
        }
    }

    #[test]
    fn partition_images_drops_requested_ids_only() {
        let (kept, removed) = partition_images(
            vec![image("a"), image("b"), image("c")],
            &["b".to_string(), "zzz".to_string()],
        );
        assert_eq!(
            kept.iter().map(|i| i.public_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );
        assert_eq!(removed, vec!["b".to_string()]);
    }
}

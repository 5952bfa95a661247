use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

use crate::{
    models::{form, media::ImageAsset},
    validation::rules::{validate_http_url, validate_not_blank, validate_tags},
};

text_enum! {
    ProjectStatus {
        Draft => "draft",
        Ongoing => "ongoing",
        Completed => "completed",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: Option<String>,
    pub tech_stack: Vec<String>,
    pub status: ProjectStatus,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    pub image: Option<Json<ImageAsset>>,
    pub team_members: Vec<String>,
    pub is_featured: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn image_public_id(&self) -> Option<String> {
        self.image.as_ref().map(|image| image.0.public_id.clone())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(min = 1, max = 2_000))]
    pub description: String,
    #[validate(length(max = 50_000))]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tech_stack: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
    #[validate(custom(function = "validate_http_url"))]
    pub github_url: Option<String>,
    #[validate(custom(function = "validate_http_url"))]
    pub live_url: Option<String>,
    #[serde(default, deserialize_with = "form::list_opt")]
    pub team_members: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 2, max = 200), custom(function = "validate_not_blank"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2_000))]
    pub description: Option<String>,
    #[validate(length(max = 50_000))]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "form::list_opt")]
    #[validate(custom(function = "validate_tags"))]
    pub tech_stack: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
    /// Empty string clears the link.
    pub github_url: Option<String>,
    /// Empty string clears the link.
    pub live_url: Option<String>,
    #[serde(default, deserialize_with = "form::list_opt")]
    pub team_members: Option<Vec<String>>,
    #[serde(default, deserialize_with = "form::bool_opt")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<String>,
    pub tech: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

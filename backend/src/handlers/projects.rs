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
    handlers::common::{
        discard_images, parse_filter, patch_optional, trimmed, unique_slug, upload_image,
        ContentForm,
    },
    models::{
        pagination::{Paginated, Pagination},
        project::{
            CreateProjectRequest, Project, ProjectListQuery, ProjectStatus, UpdateProjectRequest,
        },
        user::User,
    },
    repositories::project::{self as project_repo, ProjectFilters},
    state::AppState,
    validation::rules::validate_http_url,
};

const IMAGE_FOLDER: &str = "projects";
const IMAGE_FIELD: &str = "image";

pub async fn list_projects(
    State(state): State<AppState>,
    Query(q): Query<ProjectListQuery>,
) -> Result<Json<Paginated<Project>>, AppError> {
    list(&state, q, true).await.map(Json)
}

pub async fn admin_list_projects(
    State(state): State<AppState>,
    Query(q): Query<ProjectListQuery>,
) -> Result<Json<Paginated<Project>>, AppError> {
    list(&state, q, false).await.map(Json)
}

async fn list(
    state: &AppState,
    q: ProjectListQuery,
    exclude_drafts: bool,
) -> Result<Paginated<Project>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = ProjectFilters {
        status: parse_filter(q.status.as_deref(), "status")?,
        exclude_drafts,
        tech: trimmed(q.tech),
        featured: q.featured,
        search: trimmed(q.search),
    };
    let (items, total) =
        project_repo::list_projects(&state.pool, &filters, pagination.limit, pagination.offset())
            .await?;
    Ok(Paginated::new(items, pagination, total))
}

pub async fn get_project(
    State(state): State<AppState>,
    viewer: Option<Extension<User>>,
    Path(key): Path<String>,
) -> Result<Json<Project>, AppError> {
    let is_admin = viewer.map(|Extension(user)| user.is_admin()).unwrap_or(false);
    project_repo::find_by_id_or_slug(&state.pool, &key)
        .await?
        .filter(|project| is_admin || project.status != ProjectStatus::Draft)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Project not found".into()))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut form: ContentForm,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let payload: CreateProjectRequest = form.payload()?;

    let pool = &state.pool;
    let slug = unique_slug(&payload.title, move |slug| async move {
        project_repo::slug_exists(pool, &slug, None).await
    })
    .await?;

    let image = match form.take_file(IMAGE_FIELD) {
        Some(file) => Some(upload_image(&state, file, IMAGE_FOLDER).await?),
        None => None,
    };

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        slug,
        description: payload.description,
        content: trimmed(payload.content),
        tech_stack: payload.tech_stack.unwrap_or_default(),
        status: payload.status.unwrap_or(ProjectStatus::Ongoing),
        github_url: trimmed(payload.github_url),
        live_url: trimmed(payload.live_url),
        image: image.map(DbJson),
        team_members: payload.team_members.unwrap_or_default(),
        is_featured: payload.is_featured.unwrap_or(false),
        created_by: Some(user.id),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = project_repo::insert_project(&state.pool, &project).await {
        discard_images(&state, project.image_public_id().into_iter().collect());
        return Err(err.into());
    }
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: ContentForm,
) -> Result<Json<Project>, AppError> {
    let payload: UpdateProjectRequest = form.payload()?;
    // Blank clears the link, so the URL rule only applies to non-empty values.
    for (field, value) in [("github_url", &payload.github_url), ("live_url", &payload.live_url)] {
        if let Some(url) = value.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
            validate_http_url(url)
                .map_err(|_| AppError::BadRequest(format!("{} must be an http(s) URL", field)))?;
        }
    }

    let mut project = project_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;

    if let Some(title) = payload.title.map(|title| title.trim().to_string()) {
        if title != project.title {
            let pool = &state.pool;
            let id = id.as_str();
            project.slug = unique_slug(&title, move |slug| async move {
                project_repo::slug_exists(pool, &slug, Some(id)).await
            })
            .await?;
            project.title = title;
        }
    }
    if let Some(description) = payload.description {
        project.description = description;
    }
    patch_optional(&mut project.content, payload.content);
    if let Some(tech_stack) = payload.tech_stack {
        project.tech_stack = tech_stack;
    }
    if let Some(status) = payload.status {
        project.status = status;
    }
    patch_optional(&mut project.github_url, payload.github_url);
    patch_optional(&mut project.live_url, payload.live_url);
    if let Some(team_members) = payload.team_members {
        project.team_members = team_members;
    }
    if let Some(is_featured) = payload.is_featured {
        project.is_featured = is_featured;
    }

    let replaced = match form.take_file(IMAGE_FIELD) {
        Some(file) => {
            let uploaded = upload_image(&state, file, IMAGE_FOLDER).await?;
            Some(std::mem::replace(&mut project.image, Some(DbJson(uploaded))))
        }
        None => None,
    };
    project.updated_at = Utc::now();

    if let Err(err) = project_repo::update_project(&state.pool, &project).await {
        if replaced.is_some() {
            discard_images(&state, project.image_public_id().into_iter().collect());
        }
        return Err(err.into());
    }
    if let Some(Some(previous)) = replaced {
        discard_images(&state, vec![previous.0.public_id]);
    }
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let project = project_repo::delete_project(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    discard_images(&state, project.image_public_id().into_iter().collect());
    Ok(Json(json!({ "message": "Project deleted" })))
}

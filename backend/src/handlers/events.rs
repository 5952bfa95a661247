use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
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
        event::{CreateEventRequest, Event, EventListQuery, EventStatus, UpdateEventRequest},
        pagination::{Paginated, Pagination},
        user::User,
    },
    repositories::event::{self as event_repo, EventFilters},
    state::AppState,
};

const IMAGE_FOLDER: &str = "events";
const IMAGE_FIELD: &str = "image";

pub async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<EventListQuery>,
) -> Result<Json<Paginated<Event>>, AppError> {
    list(&state, q, true).await.map(Json)
}

pub async fn admin_list_events(
    State(state): State<AppState>,
    Query(q): Query<EventListQuery>,
) -> Result<Json<Paginated<Event>>, AppError> {
    list(&state, q, false).await.map(Json)
}

async fn list(
    state: &AppState,
    q: EventListQuery,
    exclude_drafts: bool,
) -> Result<Paginated<Event>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = EventFilters {
        category: trimmed(q.category),
        status: parse_filter(q.status.as_deref(), "status")?,
        exclude_drafts,
        upcoming: q.upcoming,
        now: Some(Utc::now()),
        search: trimmed(q.search),
    };
    let (items, total) =
        event_repo::list_events(&state.pool, &filters, pagination.limit, pagination.offset())
            .await?;
    Ok(Paginated::new(items, pagination, total))
}

pub async fn get_event(
    State(state): State<AppState>,
    viewer: Option<Extension<User>>,
    Path(key): Path<String>,
) -> Result<Json<Event>, AppError> {
    let is_admin = viewer.map(|Extension(user)| user.is_admin()).unwrap_or(false);
    event_repo::find_by_id_or_slug(&state.pool, &key)
        .await?
        .filter(|event| is_admin || event.status != EventStatus::Draft)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut form: ContentForm,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let payload: CreateEventRequest = form.payload()?;
    let event_date = payload
        .event_date
        .ok_or_else(|| AppError::BadRequest("event_date is required".into()))?;
    ensure_date_order(event_date, payload.end_date)?;

    let pool = &state.pool;
    let slug = unique_slug(&payload.title, move |slug| async move {
        event_repo::slug_exists(pool, &slug, None).await
    })
    .await?;

    let image = match form.take_file(IMAGE_FIELD) {
        Some(file) => Some(upload_image(&state, file, IMAGE_FOLDER).await?),
        None => None,
    };

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        slug,
        description: payload.description,
        category: payload.category.trim().to_lowercase(),
        status: payload.status.unwrap_or(EventStatus::Upcoming),
        event_date,
        end_date: payload.end_date,
        location: payload.location.trim().to_string(),
        registration_link: trimmed(payload.registration_link),
        max_participants: payload.max_participants,
        image: image.map(DbJson),
        tags: payload.tags.unwrap_or_default(),
        is_featured: payload.is_featured.unwrap_or(false),
        created_by: Some(user.id),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = event_repo::insert_event(&state.pool, &event).await {
        discard_images(&state, event.image_public_id().into_iter().collect());
        return Err(err.into());
    }
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: ContentForm,
) -> Result<Json<Event>, AppError> {
    let payload: UpdateEventRequest = form.payload()?;
    let mut event = event_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    if let Some(title) = payload.title.map(|title| title.trim().to_string()) {
        if title != event.title {
            let pool = &state.pool;
            let id = id.as_str();
            event.slug = unique_slug(&title, move |slug| async move {
                event_repo::slug_exists(pool, &slug, Some(id)).await
            })
            .await?;
            event.title = title;
        }
    }
    if let Some(description) = payload.description {
        event.description = description;
    }
    if let Some(category) = payload.category {
        event.category = category.trim().to_lowercase();
    }
    if let Some(status) = payload.status {
        event.status = status;
    }
    if let Some(event_date) = payload.event_date {
        event.event_date = event_date;
    }
    if payload.end_date.is_some() {
        event.end_date = payload.end_date;
    }
    ensure_date_order(event.event_date, event.end_date)?;
    if let Some(location) = payload.location {
        event.location = location.trim().to_string();
    }
    patch_optional(&mut event.registration_link, payload.registration_link);
    if payload.max_participants.is_some() {
        event.max_participants = payload.max_participants;
    }
    if let Some(tags) = payload.tags {
        event.tags = tags;
    }
    if let Some(is_featured) = payload.is_featured {
        event.is_featured = is_featured;
    }

    let replaced = match form.take_file(IMAGE_FIELD) {
        Some(file) => {
            let uploaded = upload_image(&state, file, IMAGE_FOLDER).await?;
            Some(std::mem::replace(&mut event.image, Some(DbJson(uploaded))))
        }
        None => None,
    };
    event.updated_at = Utc::now();

    if let Err(err) = event_repo::update_event(&state.pool, &event).await {
        if replaced.is_some() {
            discard_images(&state, event.image_public_id().into_iter().collect());
        }
        return Err(err.into());
    }
    if let Some(Some(previous)) = replaced {
        discard_images(&state, vec![previous.0.public_id]);
    }
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let event = event_repo::delete_event(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
    discard_images(&state, event.image_public_id().into_iter().collect());
    Ok(Json(json!({ "message": "Event deleted" })))
}

fn ensure_date_order(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), AppError> {
    match end {
        Some(end) if end < start => Err(AppError::BadRequest(
            "end_date must not be before event_date".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn end_date_may_not_precede_start() {
        let start = Utc::now();
        assert!(ensure_date_order(start, None).is_ok());
        assert!(ensure_date_order(start, Some(start + Duration::hours(2))).is_ok());
        assert!(ensure_date_order(start, Some(start - Duration::hours(2))).is_err());
    }
}

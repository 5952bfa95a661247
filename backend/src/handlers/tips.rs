use askama::Template;
use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json as DbJson;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::common::{discard_images, parse_filter, trimmed, unique_slug, upload_image, ContentForm},
    models::{
        pagination::{Paginated, Pagination},
        tip::{
            CreateTipRequest, Tip, TipAnalytics, TipCounters, TipListQuery, TipStatus,
            TrackShareRequest, TrackViewRequest, UpdateTipRequest,
        },
        user::User,
    },
    repositories::{
        settings as settings_repo,
        tip::{self as tip_repo, TipFilters, TrackingContext},
    },
    services::tip_analytics::analytics_for,
    state::AppState,
    utils::{
        text::truncate_chars,
        request::{referrer, user_agent, ClientIp},
    },
};

const IMAGE_FOLDER: &str = "tips";
const IMAGE_FIELD: &str = "cover_image";
const SHARE_DESCRIPTION_CHARS: usize = 200;

pub async fn list_tips(
    State(state): State<AppState>,
    Query(q): Query<TipListQuery>,
) -> Result<Json<Paginated<Tip>>, AppError> {
    let status = Some(TipStatus::Published);
    list(&state, q, status).await.map(Json)
}

pub async fn admin_list_tips(
    State(state): State<AppState>,
    Query(q): Query<TipListQuery>,
) -> Result<Json<Paginated<Tip>>, AppError> {
    let status = parse_filter(q.status.as_deref(), "status")?;
    list(&state, q, status).await.map(Json)
}

async fn list(
    state: &AppState,
    q: TipListQuery,
    status: Option<TipStatus>,
) -> Result<Paginated<Tip>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = TipFilters {
        status,
        category: trimmed(q.category).map(|category| category.to_lowercase()),
        tag: trimmed(q.tag),
        search: trimmed(q.search),
        sort: parse_filter(q.sort.as_deref(), "sort")?,
    };
    let (items, total) =
        tip_repo::list_tips(&state.pool, &filters, pagination.limit, pagination.offset()).await?;
    Ok(Paginated::new(items, pagination, total))
}

pub async fn get_tip_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Tip>, AppError> {
    tip_repo::find_published_by_slug(&state.pool, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))
}

fn tracking_context(
    headers: &HeaderMap,
    client: ClientIp,
    session_id: Option<String>,
) -> TrackingContext {
    TrackingContext {
        session_id: trimmed(session_id),
        referrer: referrer(headers),
        user_agent: user_agent(headers),
        ip: client.to_string_opt(),
    }
}

pub async fn track_tip_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    client: ClientIp,
    headers: HeaderMap,
    payload: Option<Json<TrackViewRequest>>,
) -> Result<Json<TipCounters>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;
    let context = tracking_context(&headers, client, payload.session_id);
    tip_repo::track_view(&state.pool, &slug, &context)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))
}

pub async fn track_tip_share(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    client: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<TrackShareRequest>,
) -> Result<Json<TipCounters>, AppError> {
    payload.validate()?;
    let platform = payload.platform.trim().to_lowercase();
    let context = tracking_context(&headers, client, payload.session_id);
    tip_repo::track_share(&state.pool, &slug, &platform, &context)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))
}

/// Crawler-facing page carrying Open Graph tags; browsers are sent on to
/// the frontend.
pub async fn share_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let tip = tip_repo::find_published_by_slug(&state.pool, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))?;
    let settings = settings_repo::get_or_create(&state.pool).await?;
    let image = tip
        .cover_image
        .as_ref()
        .map(|image| image.0.url.clone())
        .or_else(|| settings.seo.0.og_image.clone());
    let target = format!(
        "{}/tips/{}",
        state.config.frontend_url.trim_end_matches('/'),
        tip.slug
    );
    render_share_page(&settings.site_name, &tip, image.as_deref(), &target)
        .map(Html)
        .map_err(|err| AppError::InternalServerError(err.into()))
}

#[derive(Template)]
#[template(path = "tip_share.html")]
struct SharePage<'a> {
    site_name: &'a str,
    title: &'a str,
    description: String,
    image: Option<&'a str>,
    target: &'a str,
    script_target: String,
}

fn render_share_page(
    site_name: &str,
    tip: &Tip,
    image: Option<&str>,
    target: &str,
) -> askama::Result<String> {
    // JSON string literal, with `</` broken up so it cannot close the script.
    let script_target = serde_json::to_string(target)
        .unwrap_or_else(|_| "\"/\"".into())
        .replace("</", "<\\/");
    SharePage {
        site_name,
        title: &tip.title,
        description: truncate_chars(&tip.excerpt, SHARE_DESCRIPTION_CHARS),
        image,
        target,
        script_target,
    }
    .render()
}

pub async fn get_tip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tip>, AppError> {
    tip_repo::find_by_id(&state.pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))
}

pub async fn tip_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TipAnalytics>, AppError> {
    let tip = tip_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))?;
    Ok(Json(
        analytics_for(&state.pool, &tip, &state.config.time_zone).await?,
    ))
}

pub async fn create_tip(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut form: ContentForm,
) -> Result<(StatusCode, Json<Tip>), AppError> {
    let payload: CreateTipRequest = form.payload()?;

    let pool = &state.pool;
    let slug = unique_slug(&payload.title, move |slug| async move {
        tip_repo::slug_exists(pool, &slug, None).await
    })
    .await?;

    let cover_image = match form.take_file(IMAGE_FIELD) {
        Some(file) => Some(upload_image(&state, file, IMAGE_FOLDER).await?),
        None => None,
    };

    let now = Utc::now();
    let status = payload.status.unwrap_or(TipStatus::Draft);
    let tip = Tip {
        id: Uuid::new_v4().to_string(),
        title: payload.title.trim().to_string(),
        slug,
        excerpt: payload.excerpt.trim().to_string(),
        content: payload.content,
        cover_image: cover_image.map(DbJson),
        author_id: Some(user.id),
        category: payload.category.trim().to_lowercase(),
        tags: payload.tags.unwrap_or_default(),
        status,
        views: 0,
        unique_viewers: 0,
        shares: 0,
        published_at: (status == TipStatus::Published).then_some(now),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = tip_repo::insert_tip(&state.pool, &tip).await {
        discard_images(&state, tip.cover_public_id().into_iter().collect());
        return Err(err.into());
    }
    Ok((StatusCode::CREATED, Json(tip)))
}

pub async fn update_tip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: ContentForm,
) -> Result<Json<Tip>, AppError> {
    let payload: UpdateTipRequest = form.payload()?;
    let mut tip = tip_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))?;

    if let Some(title) = payload.title.map(|title| title.trim().to_string()) {
        if title != tip.title {
            let pool = &state.pool;
            let id = id.as_str();
            tip.slug = unique_slug(&title, move |slug| async move {
                tip_repo::slug_exists(pool, &slug, Some(id)).await
            })
            .await?;
            tip.title = title;
        }
    }
    if let Some(excerpt) = payload.excerpt {
        tip.excerpt = excerpt.trim().to_string();
    }
    if let Some(content) = payload.content {
        tip.content = content;
    }
    if let Some(category) = payload.category {
        tip.category = category.trim().to_lowercase();
    }
    if let Some(tags) = payload.tags {
        tip.tags = tags;
    }

    let now = Utc::now();
    if let Some(status) = payload.status {
        apply_status(&mut tip, status, now);
    }

    let replaced = match form.take_file(IMAGE_FIELD) {
        Some(file) => {
            let uploaded = upload_image(&state, file, IMAGE_FOLDER).await?;
            Some(std::mem::replace(&mut tip.cover_image, Some(DbJson(uploaded))))
        }
        None => None,
    };
    tip.updated_at = now;

    if let Err(err) = tip_repo::update_tip(&state.pool, &tip).await {
        if replaced.is_some() {
            discard_images(&state, tip.cover_public_id().into_iter().collect());
        }
        return Err(err.into());
    }
    if let Some(Some(previous)) = replaced {
        discard_images(&state, vec![previous.0.public_id]);
    }
    Ok(Json(tip))
}

// published_at records the first publication and survives unpublishing.
fn apply_status(tip: &mut Tip, status: TipStatus, now: chrono::DateTime<Utc>) {
    tip.status = status;
    if status == TipStatus::Published && tip.published_at.is_none() {
        tip.published_at = Some(now);
    }
}

pub async fn delete_tip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tip = tip_repo::delete_tip(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tip not found".into()))?;
    discard_images(&state, tip.cover_public_id().into_iter().collect());
    Ok(Json(json!({ "message": "Tip deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tip(title: &str, excerpt: &str) -> Tip {
        let now = Utc::now();
        Tip {
            id: "t1".into(),
            title: title.into(),
            slug: "sample".into(),
            excerpt: excerpt.into(),
            content: "body".into(),
            cover_image: None,
            author_id: None,
            category: "rust".into(),
            tags: vec![],
            status: TipStatus::Draft,
            views: 0,
            unique_viewers: 0,
            shares: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn share_page_escapes_values() {
        let html = render_share_page(
            "Club",
            &tip("<script>alert(1)", "Tom & \"Jerry\""),
            Some("https://cdn.test/a.jpg"),
            "https://club.test/tips/sample",
        )
        .expect("render");
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;alert(1)"));
        assert!(html.contains("Tom &amp; &quot;Jerry&quot;"));
        assert!(html.contains("og:image"));
        assert!(html.contains("a.jpg"));
        assert!(html.contains("summary_large_image"));
        assert!(html.contains(r#"window.location.replace("https://club.test/tips/sample")"#));
    }

    #[test]
    fn share_page_without_image_uses_summary_card() {
        let html = render_share_page("Club", &tip("Hi", "There"), None, "https://club.test/tips/hi")
            .expect("render");
        assert!(!html.contains("og:image"));
        assert!(html.contains("content=\"summary\""));
    }

    #[test]
    fn first_publish_sets_published_at_once() {
        let mut tip = tip("Hi", "There");
        let first = Utc::now();
        apply_status(&mut tip, TipStatus::Published, first);
        assert_eq!(tip.published_at, Some(first));

        apply_status(&mut tip, TipStatus::Draft, first + Duration::hours(1));
        apply_status(&mut tip, TipStatus::Published, first + Duration::hours(2));
        assert_eq!(tip.published_at, Some(first));
    }
}

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::types::Json as DbJson;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::common::{parse_filter, trimmed},
    models::{
        pagination::{Paginated, Pagination},
        subscriber::{
            NewsletterStats, Preferences, PreferenceTopic, PreferencesPatch, SendNewsletterRequest,
            SendNewsletterResponse, SubscribeRequest, Subscriber, SubscriberListQuery,
            SubscriberStatus, SubscriberStatusRequest,
        },
    },
    repositories::{
        settings as settings_repo,
        subscriber::{self as subscriber_repo, SubscriberFilters},
    },
    services::{
        mailer::{send_best_effort, OutgoingEmail},
        newsletter::{generate_unsubscribe_token, send_campaign, unsubscribe_url, Campaign},
    },
    state::AppState,
    utils::{csv::render_csv, email_templates::newsletter_welcome},
};

const STATS_RECENT_DAYS: i64 = 30;
const EXPORT_HEADERS: [&str; 7] = [
    "email",
    "name",
    "status",
    "source",
    "subscribed_at",
    "unsubscribed_at",
    "last_email_sent_at",
];

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    payload.validate()?;
    let settings = settings_repo::get_or_create(&state.pool).await?;
    if !settings.features.newsletter_enabled {
        return Err(AppError::Forbidden("Newsletter signups are closed".into()));
    }

    let email = payload.email.trim().to_lowercase();
    let name = trimmed(payload.name);
    let patch = payload.preferences.unwrap_or_default();
    let now = Utc::now();

    let (status, subscriber) = match subscriber_repo::find_by_email(&state.pool, &email).await? {
        Some(existing) if existing.status == SubscriberStatus::Active => {
            return Err(AppError::Conflict("This email is already subscribed".into()));
        }
        Some(mut existing) => {
            existing.status = SubscriberStatus::Active;
            existing.unsubscribed_at = None;
            existing.subscribed_at = now;
            existing.updated_at = now;
            if name.is_some() {
                existing.name = name;
            }
            if let Some(source) = trimmed(payload.source) {
                existing.source = Some(source);
            }
            existing.preferences.0.apply(&patch);
            subscriber_repo::update_subscriber(&state.pool, &existing).await?;
            (StatusCode::OK, existing)
        }
        None => {
            let mut preferences = Preferences::default();
            preferences.apply(&patch);
            let subscriber = Subscriber {
                id: Uuid::new_v4().to_string(),
                email,
                name,
                status: SubscriberStatus::Active,
                preferences: DbJson(preferences),
                unsubscribe_token: generate_unsubscribe_token(),
                source: trimmed(payload.source),
                subscribed_at: now,
                unsubscribed_at: None,
                last_email_sent_at: None,
                created_at: now,
                updated_at: now,
            };
            subscriber_repo::insert_subscriber(&state.pool, &subscriber).await?;
            (StatusCode::CREATED, subscriber)
        }
    };

    match newsletter_welcome(
        &settings.site_name,
        subscriber.name.as_deref(),
        &unsubscribe_url(&state.config.public_api_url, &subscriber.unsubscribe_token),
    ) {
        Ok(html_body) => {
            let welcome = OutgoingEmail {
                to: subscriber.email.clone(),
                subject: format!("Welcome to the {} newsletter", settings.site_name),
                html_body,
                reply_to: None,
            };
            let mailer = state.mailer.clone();
            tokio::spawn(async move {
                send_best_effort(mailer.as_ref(), welcome).await;
            });
        }
        Err(err) => tracing::warn!(error = ?err, "Failed to render welcome email"),
    }

    let message = if status == StatusCode::CREATED {
        "Subscribed successfully"
    } else {
        "Welcome back! Your subscription is active again"
    };
    Ok((
        status,
        Json(json!({ "message": message, "subscriber": subscriber })),
    ))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, AppError> {
    let subscriber = subscriber_repo::find_by_token(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;
    if subscriber.status != SubscriberStatus::Unsubscribed {
        subscriber_repo::update_status(&state.pool, &subscriber.id, SubscriberStatus::Unsubscribed)
            .await?;
    }
    Ok(Json(json!({ "message": "You have been unsubscribed" })))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<Value>, AppError> {
    let mut subscriber = subscriber_repo::find_by_token(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;
    subscriber.preferences.0.apply(&patch);
    subscriber.updated_at = Utc::now();
    subscriber_repo::update_subscriber(&state.pool, &subscriber).await?;
    Ok(Json(json!({
        "message": "Preferences updated",
        "preferences": subscriber.preferences.0,
    })))
}

pub async fn list_subscribers(
    State(state): State<AppState>,
    Query(q): Query<SubscriberListQuery>,
) -> Result<Json<Paginated<Subscriber>>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = SubscriberFilters {
        status: parse_filter(q.status.as_deref(), "status")?,
        search: trimmed(q.search),
    };
    let (items, total) = subscriber_repo::list_subscribers(
        &state.pool,
        &filters,
        pagination.limit,
        pagination.offset(),
    )
    .await?;
    Ok(Json(Paginated::new(items, pagination, total)))
}

pub async fn newsletter_stats(
    State(state): State<AppState>,
) -> Result<Json<NewsletterStats>, AppError> {
    let since = Utc::now() - Duration::days(STATS_RECENT_DAYS);
    Ok(Json(subscriber_repo::stats(&state.pool, since).await?))
}

pub async fn export_subscribers(State(state): State<AppState>) -> Result<Response, AppError> {
    let subscribers = subscriber_repo::all_subscribers(&state.pool).await?;
    let rows: Vec<Vec<String>> = subscribers.iter().map(export_row).collect();
    let body = render_csv(&EXPORT_HEADERS, &rows)?;
    let filename = format!("subscribers-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

fn export_row(subscriber: &Subscriber) -> Vec<String> {
    let timestamp = |value: Option<chrono::DateTime<Utc>>| {
        value.map(|at| at.to_rfc3339()).unwrap_or_default()
    };
    vec![
        subscriber.email.clone(),
        subscriber.name.clone().unwrap_or_default(),
        subscriber.status.to_string(),
        subscriber.source.clone().unwrap_or_default(),
        subscriber.subscribed_at.to_rfc3339(),
        timestamp(subscriber.unsubscribed_at),
        timestamp(subscriber.last_email_sent_at),
    ]
}

pub async fn update_subscriber_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SubscriberStatusRequest>,
) -> Result<Json<Subscriber>, AppError> {
    subscriber_repo::update_status(&state.pool, &id, payload.status)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Subscriber not found".into()))
}

pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !subscriber_repo::delete_subscriber(&state.pool, &id).await? {
        return Err(AppError::NotFound("Subscriber not found".into()));
    }
    Ok(Json(json!({ "message": "Subscriber deleted" })))
}

pub async fn send_newsletter(
    State(state): State<AppState>,
    Json(payload): Json<SendNewsletterRequest>,
) -> Result<Json<SendNewsletterResponse>, AppError> {
    payload.validate()?;
    let settings = settings_repo::get_or_create(&state.pool).await?;
    let campaign = Campaign {
        site_name: settings.site_name,
        subject: payload.subject.trim().to_string(),
        content_html: payload.content,
        public_api_url: state.config.public_api_url.clone(),
    };
    let topic = payload.topic.unwrap_or(PreferenceTopic::Newsletter);
    let summary = send_campaign(&state.pool, state.mailer.clone(), campaign, topic).await?;
    tracing::info!(
        recipients = summary.recipients,
        sent = summary.sent,
        failed = summary.failed,
        "Newsletter sent"
    );
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_row_matches_header_order() {
        let now = Utc::now();
        let subscriber = Subscriber {
            id: "s1".into(),
            email: "ann@club.test".into(),
            name: None,
            status: SubscriberStatus::Unsubscribed,
            preferences: DbJson(Preferences::default()),
            unsubscribe_token: "token".into(),
            source: Some("footer".into()),
            subscribed_at: now,
            unsubscribed_at: Some(now),
            last_email_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let row = export_row(&subscriber);
        assert_eq!(row.len(), EXPORT_HEADERS.len());
        assert_eq!(row[0], "ann@club.test");
        assert_eq!(row[1], "");
        assert_eq!(row[2], "unsubscribed");
        assert_eq!(row[3], "footer");
        assert_eq!(row[6], "");
    }
}

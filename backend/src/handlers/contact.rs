use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::common::{parse_filter, trimmed},
    models::{
        contact::{
            Contact, ContactCreatedResponse, ContactListQuery, ContactStats, ContactStatus,
            CreateContactRequest, ReplyContactRequest, UpdateContactRequest,
        },
        pagination::{Paginated, Pagination},
    },
    repositories::{
        contact::{self as contact_repo, ContactFilters},
        settings as settings_repo,
    },
    services::mailer::{send_best_effort, OutgoingEmail},
    state::AppState,
    utils::{
        email_templates::{
            contact_admin_notification, contact_auto_reply, contact_reply, ContactNotification,
        },
        request::{user_agent, ClientIp},
    },
};

const STATS_RECENT_DAYS: i64 = 7;

pub async fn submit_contact(
    State(state): State<AppState>,
    client: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactCreatedResponse>), AppError> {
    payload.validate()?;

    let now = Utc::now();
    let contact = Contact {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        phone: trimmed(payload.phone),
        subject: payload.subject.trim().to_string(),
        message: payload.message.trim().to_string(),
        status: ContactStatus::New,
        admin_notes: None,
        ip: client.to_string_opt(),
        user_agent: user_agent(&headers),
        read_at: None,
        replied_at: None,
        created_at: now,
        updated_at: now,
    };
    contact_repo::insert_contact(&state.pool, &contact).await?;

    let id = contact.id.clone();
    tokio::spawn(notify_contact_received(state, contact));

    Ok((
        StatusCode::CREATED,
        Json(ContactCreatedResponse {
            id,
            message: "Thanks for your message. We will get back to you soon.".into(),
        }),
    ))
}

// Both mails are best-effort; the submission is already stored.
async fn notify_contact_received(state: AppState, contact: Contact) {
    let settings = match settings_repo::get_or_create(&state.pool).await {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = ?err, "Skipping contact emails; settings unavailable");
            return;
        }
    };

    let admin_to = state
        .config
        .admin_notification_email
        .clone()
        .or_else(|| Some(settings.contact_email.clone()).filter(|email| !email.is_empty()));
    if let Some(to) = admin_to {
        let rendered = contact_admin_notification(
            &settings.site_name,
            &ContactNotification {
                name: &contact.name,
                email: &contact.email,
                phone: contact.phone.as_deref(),
                subject: &contact.subject,
                message: &contact.message,
            },
        );
        match rendered {
            Ok(html_body) => {
                send_best_effort(
                    state.mailer.as_ref(),
                    OutgoingEmail {
                        to,
                        subject: format!("New contact message: {}", contact.subject),
                        html_body,
                        reply_to: Some(contact.email.clone()),
                    },
                )
                .await;
            }
            Err(err) => tracing::warn!(error = ?err, "Failed to render contact notification"),
        }
    }

    match contact_auto_reply(&settings.site_name, &contact.name, &contact.subject) {
        Ok(html_body) => {
            send_best_effort(
                state.mailer.as_ref(),
                OutgoingEmail {
                    to: contact.email.clone(),
                    subject: format!("We received your message: {}", contact.subject),
                    html_body,
                    reply_to: None,
                },
            )
            .await;
        }
        Err(err) => tracing::warn!(error = ?err, "Failed to render contact auto-reply"),
    }
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Query(q): Query<ContactListQuery>,
) -> Result<Json<Paginated<Contact>>, AppError> {
    let pagination = Pagination::new(q.page, q.limit);
    let filters = ContactFilters {
        status: parse_filter(q.status.as_deref(), "status")?,
        search: trimmed(q.search),
    };
    let (items, total) =
        contact_repo::list_contacts(&state.pool, &filters, pagination.limit, pagination.offset())
            .await?;
    Ok(Json(Paginated::new(items, pagination, total)))
}

pub async fn contact_stats(State(state): State<AppState>) -> Result<Json<ContactStats>, AppError> {
    let since = Utc::now() - Duration::days(STATS_RECENT_DAYS);
    Ok(Json(contact_repo::stats(&state.pool, since).await?))
}

/// Fetching a `new` message marks it `read`.
pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, AppError> {
    contact_repo::mark_read(&state.pool, &id, Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Contact message not found".into()))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateContactRequest>,
) -> Result<Json<Contact>, AppError> {
    payload.validate()?;
    contact_repo::update_contact(&state.pool, &id, payload.status, payload.admin_notes.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Contact message not found".into()))
}

pub async fn reply_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReplyContactRequest>,
) -> Result<Json<Contact>, AppError> {
    payload.validate()?;
    let contact = contact_repo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact message not found".into()))?;
    let settings = settings_repo::get_or_create(&state.pool).await?;

    let subject = trimmed(payload.subject).unwrap_or_else(|| format!("Re: {}", contact.subject));
    let email = OutgoingEmail {
        to: contact.email.clone(),
        subject,
        html_body: contact_reply(
            &settings.site_name,
            &contact.name,
            &contact.subject,
            &payload.message,
        )
        .map_err(|err| AppError::InternalServerError(err.into()))?,
        reply_to: Some(settings.contact_email.clone()).filter(|email| !email.is_empty()),
    };
    state.mailer.send(email).await.map_err(|err| {
        tracing::warn!(error = ?err, contact_id = %contact.id, "Failed to send contact reply");
        AppError::BadGateway("Failed to send reply email".into())
    })?;

    contact_repo::mark_replied(&state.pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Contact message not found".into()))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !contact_repo::delete_contact(&state.pool, &id).await? {
        return Err(AppError::NotFound("Contact message not found".into()));
    }
    Ok(Json(json!({ "message": "Contact message deleted" })))
}

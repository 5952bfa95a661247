use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use uuid::Uuid;

use crate::{
    middleware::auth::bearer_token,
    models::{
        activity_log::{ActivityAction, ActivityLog, ActivityModule},
        user::User,
    },
    state::AppState,
    utils::{
        jwt::verify_access_token,
        request::{client_ip, peer_ip, user_agent},
        text::truncate_chars,
    },
};

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_DETAIL_VALUE_CHARS: usize = 100;
const ANONYMOUS_ROLE: &str = "anonymous";

/// Paths that never produce an activity record (high-volume or noise).
const EXCLUDED_PATHS: &[&str] = &["/health", "/dbhealth", "/api/auth/refresh"];

/// Prefixes logged even for anonymous reads.
const PUBLIC_ROUTE_PREFIXES: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/contact",
    "/api/newsletter/subscribe",
    "/api/newsletter/unsubscribe",
    "/api/tips/share",
];

const MODULE_TABLE: &[(&str, ActivityModule)] = &[
    ("auth", ActivityModule::Auth),
    ("users", ActivityModule::Users),
    ("events", ActivityModule::Events),
    ("gallery", ActivityModule::Gallery),
    ("projects", ActivityModule::Projects),
    ("team", ActivityModule::Team),
    ("contact", ActivityModule::Contact),
    ("settings", ActivityModule::Settings),
    ("newsletter", ActivityModule::Newsletter),
    ("tips", ActivityModule::Tips),
    ("traffic", ActivityModule::Traffic),
    ("home", ActivityModule::Home),
];

/// Body fields tried, in order, for the short description appended to mutations.
const DETAIL_FIELDS: &[&str] = &["name", "title", "email", "subject"];

struct Actor {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    role: String,
}

impl From<User> for Actor {
    fn from(user: User) -> Self {
        Self {
            id: Some(user.id),
            name: Some(user.name),
            email: Some(user.email),
            role: user.role.as_str().to_string(),
        }
    }
}

pub async fn activity_log(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if method == Method::OPTIONS || is_excluded(&method, &path) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let headers = request.headers().clone();
    let ip = client_ip(
        &headers,
        peer_ip(request.extensions()),
        &state.config.trusted_proxies,
    )
    .map(|ip| ip.to_string());
    let mutation = is_mutation(&method);
    let body_bytes = if mutation && is_json(&headers) {
        let (buffered_request, bytes) = buffer_request_body(request).await;
        request = buffered_request;
        bytes
    } else {
        None
    };

    let response = next.run(request).await;
    let response_time_ms = started.elapsed().as_millis() as i64;

    let actor = response
        .extensions()
        .get::<User>()
        .cloned()
        .map(Actor::from)
        .or_else(|| actor_from_token(&headers, &state.config.jwt_secret));

    if !mutation && actor.is_none() && !is_public_route(&path) {
        return response;
    }

    let (action, module) = classify(&method, &path);
    let status = response.status().as_u16();
    let summary = body_bytes.as_deref().and_then(body_summary);
    let details = describe(action, module, status, mutation, summary.as_deref());
    let actor = actor.unwrap_or(Actor {
        id: None,
        name: None,
        email: None,
        role: ANONYMOUS_ROLE.to_string(),
    });

    let entry = ActivityLog {
        id: Uuid::new_v4().to_string(),
        user_id: actor.id,
        user_name: actor.name,
        user_email: actor.email,
        role: actor.role,
        action,
        module,
        details,
        ip,
        method: method.to_string(),
        url: path,
        status_code: i32::from(status),
        response_time_ms,
        user_agent: user_agent(&headers),
        created_at: Utc::now(),
    };

    let service = state.activity_log.clone();
    tokio::spawn(async move {
        if let Err(err) = service.record(entry).await {
            tracing::warn!(error = ?err, "Failed to record activity log");
        }
    });

    response
}

fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false)
}

fn is_excluded(method: &Method, path: &str) -> bool {
    if EXCLUDED_PATHS.contains(&path) {
        return true;
    }
    if *method != Method::POST {
        return false;
    }
    if path == "/api/traffic/track" {
        return true;
    }
    let segments = segments(path);
    matches!(
        segments.as_slice(),
        ["api", "tips", "slug", _, "view"] | ["api", "tips", "slug", _, "share"]
    )
}

fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn classify(method: &Method, path: &str) -> (ActivityAction, ActivityModule) {
    let segments = segments(path);
    let module = match segments.as_slice() {
        ["api", name, ..] => MODULE_TABLE
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, module)| *module)
            .unwrap_or(ActivityModule::System),
        _ => ActivityModule::System,
    };

    let action = match segments.as_slice() {
        ["api", "auth", "login"] => ActivityAction::Login,
        ["api", "auth", "logout"] => ActivityAction::Logout,
        ["api", "auth", "register"] => ActivityAction::Register,
        ["api", "newsletter", "subscribe"] => ActivityAction::Subscribe,
        ["api", "newsletter", "unsubscribe", ..] => ActivityAction::Unsubscribe,
        ["api", "newsletter", "send"] => ActivityAction::Send,
        _ if segments.contains(&"export") => ActivityAction::Export,
        _ => match *method {
            Method::POST => ActivityAction::Create,
            Method::PUT | Method::PATCH => ActivityAction::Update,
            Method::DELETE => ActivityAction::Delete,
            Method::GET => ActivityAction::View,
            _ => ActivityAction::Other,
        },
    };

    (action, module)
}

fn describe(
    action: ActivityAction,
    module: ActivityModule,
    status: u16,
    mutation: bool,
    summary: Option<&str>,
) -> String {
    let mut details = format!(
        "{} {} ({})",
        action.as_str().to_ascii_uppercase(),
        module.as_str(),
        status
    );
    if mutation {
        if let Some(summary) = summary {
            details.push_str(": ");
            details.push_str(summary);
        }
    }
    details
}

fn body_summary(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let object = value.as_object()?;
    DETAIL_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| truncate_chars(text, MAX_DETAIL_VALUE_CHARS))
    })
}

// Soft auth: identify the caller without touching the database.
fn actor_from_token(headers: &HeaderMap, secret: &str) -> Option<Actor> {
    let token = bearer_token(headers)?;
    let claims = verify_access_token(token, secret).ok()?;
    Some(Actor {
        id: Some(claims.sub),
        name: None,
        email: Some(claims.email),
        role: claims.role,
    })
}

struct BufferedBody {
    buffered: VecDeque<Frame<Bytes>>,
    inner: Body,
    pending_error: Option<axum::Error>,
}

impl BufferedBody {
    fn buffered_len(&self) -> u64 {
        self.buffered
            .iter()
            .filter_map(|frame| frame.data_ref().map(|data| data.len() as u64))
            .sum()
    }
}

impl HttpBody for BufferedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(frame) = this.buffered.pop_front() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if let Some(err) = this.pending_error.take() {
            this.inner = Body::empty();
            return Poll::Ready(Some(Err(err)));
        }
        Pin::new(&mut this.inner).poll_frame(cx)
    }

    fn size_hint(&self) -> http_body::SizeHint {
        let buffered_len = self.buffered_len();
        let mut hint = self.inner.size_hint();
        hint.set_lower(hint.lower().saturating_add(buffered_len));
        if let Some(upper) = hint.upper() {
            hint.set_upper(upper.saturating_add(buffered_len));
        }
        hint
    }

    fn is_end_stream(&self) -> bool {
        if !self.buffered.is_empty() || self.pending_error.is_some() {
            return false;
        }
        self.inner.is_end_stream()
    }
}

/// Reads up to `MAX_BUFFERED_BODY_BYTES` for inspection and hands the handler
/// a body that replays everything, including the unread remainder.
async fn buffer_request_body(request: Request) -> (Request, Option<Bytes>) {
    let (parts, mut body) = request.into_parts();
    let mut frames = VecDeque::new();
    let mut collected = Vec::new();
    let mut overflowed = false;
    let mut pending_error = None;

    while let Some(next) = body.frame().await {
        match next {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    if collected.len() + data.len() > MAX_BUFFERED_BODY_BYTES {
                        overflowed = true;
                    } else {
                        collected.extend_from_slice(data);
                    }
                }
                frames.push_back(frame);
                if overflowed {
                    break;
                }
            }
            Err(err) => {
                pending_error = Some(err);
                break;
            }
        }
    }

    let bytes = (!overflowed && pending_error.is_none()).then(|| Bytes::from(collected));
    let replay = BufferedBody {
        buffered: frames,
        inner: body,
        pending_error,
    };
    (Request::from_parts(parts, Body::new(replay)), bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_special_routes_before_method() {
        assert_eq!(
            classify(&Method::POST, "/api/auth/login"),
            (ActivityAction::Login, ActivityModule::Auth)
        );
        assert_eq!(
            classify(&Method::GET, "/api/newsletter/unsubscribe/abc"),
            (ActivityAction::Unsubscribe, ActivityModule::Newsletter)
        );
        assert_eq!(
            classify(&Method::GET, "/api/newsletter/export"),
            (ActivityAction::Export, ActivityModule::Newsletter)
        );
        assert_eq!(
            classify(&Method::DELETE, "/api/events/e1"),
            (ActivityAction::Delete, ActivityModule::Events)
        );
        assert_eq!(
            classify(&Method::PATCH, "/api/contact/c1"),
            (ActivityAction::Update, ActivityModule::Contact)
        );
        assert_eq!(
            classify(&Method::GET, "/metrics"),
            (ActivityAction::View, ActivityModule::System)
        );
    }

    #[test]
    fn tracking_and_health_routes_are_excluded() {
        assert!(is_excluded(&Method::GET, "/health"));
        assert!(is_excluded(&Method::POST, "/api/auth/refresh"));
        assert!(is_excluded(&Method::POST, "/api/traffic/track"));
        assert!(is_excluded(&Method::POST, "/api/tips/slug/git-tricks/view"));
        assert!(is_excluded(&Method::POST, "/api/tips/slug/git-tricks/share"));
        assert!(!is_excluded(&Method::GET, "/api/tips/slug/git-tricks"));
        assert!(!is_excluded(&Method::POST, "/api/tips"));
    }

    #[test]
    fn public_routes_match_by_prefix() {
        assert!(is_public_route("/api/newsletter/unsubscribe/tok"));
        assert!(is_public_route("/api/tips/share/git-tricks"));
        assert!(!is_public_route("/api/events"));
    }

    #[test]
    fn describe_appends_summary_for_mutations_only() {
        assert_eq!(
            describe(
                ActivityAction::Create,
                ActivityModule::Events,
                201,
                true,
                Some("Hack Night")
            ),
            "CREATE events (201): Hack Night"
        );
        assert_eq!(
            describe(
                ActivityAction::View,
                ActivityModule::Contact,
                200,
                false,
                Some("ignored")
            ),
            "VIEW contact (200)"
        );
    }

    #[test]
    fn body_summary_prefers_name_then_title() {
        let body = br#"{"title":"Intro","name":"  Ada  ","email":"a@b.c"}"#;
        assert_eq!(body_summary(body).as_deref(), Some("Ada"));
        let body = br#"{"subject":"Hello","name":""}"#;
        assert_eq!(body_summary(body).as_deref(), Some("Hello"));
        assert_eq!(body_summary(b"not json"), None);
        assert_eq!(body_summary(b"[1,2]"), None);
    }

    #[tokio::test]
    async fn buffered_request_replays_full_body() {
        let payload = vec![b'x'; MAX_BUFFERED_BODY_BYTES + 10];
        let request = Request::builder()
            .body(Body::from(payload.clone()))
            .expect("request");
        let (request, captured) = buffer_request_body(request).await;
        assert!(captured.is_none());
        let replayed = request
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        assert_eq!(replayed.len(), payload.len());
    }
}

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::AppError,
    handlers,
    middleware as app_middleware,
    state::AppState,
};

/// Builds the full application router with every layer attached.
pub fn build_router(state: AppState) -> Router {
    // Public endpoints (no auth)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/dbhealth", get(handlers::health::db_health))
        .route("/api/home", get(handlers::home::home))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/settings", get(handlers::settings::get_public_settings))
        .route("/api/events", get(handlers::events::list_events))
        .route("/api/gallery", get(handlers::gallery::list_gallery))
        .route(
            "/api/gallery/categories",
            get(handlers::gallery::list_categories),
        )
        .route("/api/projects", get(handlers::projects::list_projects))
        .route("/api/team", get(handlers::team::list_team))
        .route(
            "/api/newsletter/unsubscribe/{token}",
            get(handlers::newsletter::unsubscribe),
        )
        .route(
            "/api/newsletter/preferences/{token}",
            put(handlers::newsletter::update_preferences),
        )
        .route("/api/tips", get(handlers::tips::list_tips))
        .route("/api/tips/slug/{slug}", get(handlers::tips::get_tip_by_slug))
        .route(
            "/api/tips/slug/{slug}/view",
            post(handlers::tips::track_tip_view),
        )
        .route(
            "/api/tips/slug/{slug}/share",
            post(handlers::tips::track_tip_share),
        )
        .route("/api/tips/share/{slug}", get(handlers::tips::share_page))
        .route("/api/traffic/track", post(handlers::traffic::track_page_view));

    // Public writes guarded by the per-IP limiter
    let limited_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/contact", post(handlers::contact::submit_contact))
        .route(
            "/api/newsletter/subscribe",
            post(handlers::newsletter::subscribe),
        )
        .route_layer(app_middleware::create_public_rate_limiter(&state.config))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::resolve_forwarded_peer,
        ));

    // Public reads where admins additionally see drafts
    let soft_auth_routes = Router::new()
        .route("/api/events/{id}", get(handlers::events::get_event))
        .route("/api/gallery/{id}", get(handlers::gallery::get_gallery_item))
        .route("/api/projects/{id}", get(handlers::projects::get_project))
        .route("/api/team/{id}", get(handlers::team::get_team_member))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::optional_auth,
        ));

    // Authenticated user endpoints
    let user_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/change-password",
            put(handlers::auth::change_password),
        )
        .route("/api/users/me", put(handlers::users::update_me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth,
        ));

    // Admin endpoints (auth + admin role)
    let admin_routes = Router::new()
        .route("/api/users", get(handlers::admin::list_users))
        .route(
            "/api/users/activity",
            get(handlers::admin::list_activity_logs),
        )
        .route(
            "/api/users/activity/stats",
            get(handlers::admin::activity_stats),
        )
        .route(
            "/api/users/{id}",
            get(handlers::admin::get_user).delete(handlers::admin::delete_user),
        )
        .route("/api/users/{id}/role", put(handlers::admin::update_user_role))
        .route(
            "/api/users/{id}/status",
            put(handlers::admin::update_user_status),
        )
        .route("/api/events", post(handlers::events::create_event))
        .route(
            "/api/events/admin/all",
            get(handlers::events::admin_list_events),
        )
        .route(
            "/api/events/{id}",
            put(handlers::events::update_event).delete(handlers::events::delete_event),
        )
        .route("/api/gallery", post(handlers::gallery::create_gallery_item))
        .route(
            "/api/gallery/admin/all",
            get(handlers::gallery::admin_list_gallery),
        )
        .route(
            "/api/gallery/{id}",
            put(handlers::gallery::update_gallery_item)
                .delete(handlers::gallery::delete_gallery_item),
        )
        .route("/api/projects", post(handlers::projects::create_project))
        .route(
            "/api/projects/admin/all",
            get(handlers::projects::admin_list_projects),
        )
        .route(
            "/api/projects/{id}",
            put(handlers::projects::update_project).delete(handlers::projects::delete_project),
        )
        .route("/api/team", post(handlers::team::create_team_member))
        .route("/api/team/admin/all", get(handlers::team::admin_list_team))
        .route("/api/team/reorder", put(handlers::team::reorder_team))
        .route(
            "/api/team/{id}",
            put(handlers::team::update_team_member).delete(handlers::team::delete_team_member),
        )
        .route("/api/contact", get(handlers::contact::list_contacts))
        .route("/api/contact/stats", get(handlers::contact::contact_stats))
        .route(
            "/api/contact/{id}",
            get(handlers::contact::get_contact)
                .put(handlers::contact::update_contact)
                .delete(handlers::contact::delete_contact),
        )
        .route(
            "/api/contact/{id}/reply",
            post(handlers::contact::reply_contact),
        )
        .route("/api/settings", put(handlers::settings::update_settings))
        .route("/api/settings/admin", get(handlers::settings::get_settings))
        .route(
            "/api/newsletter/subscribers",
            get(handlers::newsletter::list_subscribers),
        )
        .route(
            "/api/newsletter/subscribers/{id}",
            delete(handlers::newsletter::delete_subscriber),
        )
        .route(
            "/api/newsletter/subscribers/{id}/status",
            put(handlers::newsletter::update_subscriber_status),
        )
        .route(
            "/api/newsletter/stats",
            get(handlers::newsletter::newsletter_stats),
        )
        .route(
            "/api/newsletter/export",
            get(handlers::newsletter::export_subscribers),
        )
        .route("/api/newsletter/send", post(handlers::newsletter::send_newsletter))
        .route("/api/tips", post(handlers::tips::create_tip))
        .route("/api/tips/admin/all", get(handlers::tips::admin_list_tips))
        .route(
            "/api/tips/{id}",
            get(handlers::tips::get_tip)
                .put(handlers::tips::update_tip)
                .delete(handlers::tips::delete_tip),
        )
        .route("/api/tips/{id}/analytics", get(handlers::tips::tip_analytics))
        .route("/api/traffic/stats", get(handlers::traffic::traffic_stats))
        .route(
            "/api/traffic/realtime",
            get(handlers::traffic::traffic_realtime),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_admin,
        ));

    let max_upload_bytes = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(limited_routes)
        .merge(soft_auth_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .fallback(route_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::activity_log,
        ))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(app_middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(axum_middleware::from_fn(app_middleware::log_error_responses))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                .layer(cors),
        )
        .with_state(state)
}

async fn route_not_found() -> impl IntoResponse {
    AppError::NotFound("Route not found".into())
}

fn handle_panic(_: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    tracing::error!("Request handler panicked");
    AppError::InternalServerError(anyhow::anyhow!("handler panicked")).into_response()
}

fn cors_layer(config: &Config) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();
    if origins.is_empty() {
        if let Ok(frontend) = HeaderValue::from_str(config.frontend_url.trim_end_matches('/')) {
            origins.push(frontend);
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .allow_credentials(true)
        .max_age(Duration::from_secs(24 * 60 * 60))
}

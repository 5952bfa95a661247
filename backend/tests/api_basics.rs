use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{body_json, lazy_pool, test_app};

#[tokio::test]
async fn health_reports_ok_with_uptime() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_json_not_found() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    for (method, uri) in [
        ("GET", "/api/auth/me"),
        ("PUT", "/api/users/me"),
        ("GET", "/api/users"),
        ("GET", "/api/contact"),
        ("GET", "/api/settings/admin"),
        ("GET", "/api/newsletter/export"),
        ("GET", "/api/traffic/stats"),
        ("DELETE", "/api/events/some-id"),
    ] {
        let app = test_app(lazy_pool());
        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require auth",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn contact_submission_is_validated_before_storage() {
    let app = test_app(lazy_pool());
    let payload = json!({
        "name": "A",
        "email": "not-an-email",
        "subject": "Hi",
        "message": "short",
    });
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/contact")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(app.mailer.recipients().is_empty());
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_with_forged_cookie_is_unauthorized() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", "refresh_token=forged.token.value")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = test_app(lazy_pool());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/contact")
                .header("Origin", "http://localhost:5173")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );
}

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use clubhouse_backend::models::user::UserRole;
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{
    body_json, integration_guard, seed_user, set_cookie_pair, test_app, test_pool, TEST_PASSWORD,
};

fn refresh_request(cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/refresh")
        .header("Cookie", cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn rotated_refresh_token_is_rejected() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = seed_user(&pool, UserRole::Member).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({ "email": user.email, "password": TEST_PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first_cookie = set_cookie_pair(&response, "refresh_token").expect("refresh cookie");
    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["email"], user.email);

    let response = app
        .router
        .clone()
        .oneshot(refresh_request(&first_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second_cookie = set_cookie_pair(&response, "refresh_token").expect("rotated cookie");
    assert_ne!(first_cookie, second_cookie);

    // The superseded token still verifies but its digest is gone.
    let response = app
        .router
        .clone()
        .oneshot(refresh_request(&first_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .oneshot(refresh_request(&second_cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_logged() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let user = seed_user(&pool, UserRole::Member).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({ "email": user.email, "password": "not-the-password" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logging runs on a spawned task.
    for _ in 0..50 {
        if !app.activity.logs.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let logs = app.activity.logs.lock().unwrap();
    let entry = logs.first().expect("login attempt logged");
    assert_eq!(entry.action.as_str(), "login");
    assert_eq!(entry.module.as_str(), "auth");
    assert_eq!(entry.status_code, 401);
    assert!(!entry.details.contains("not-the-password"));
}

fn register_request(email: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "name": "New Member", "email": email, "password": TEST_PASSWORD })
                .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn concurrent_first_registrations_create_one_admin() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    sqlx::query("DELETE FROM users").execute(&pool).await.unwrap();
    let app = test_app(pool.clone());

    let (first, second) = tokio::join!(
        app.router.clone().oneshot(register_request("first@club.test")),
        app.router.clone().oneshot(register_request("second@club.test")),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(second.status(), StatusCode::CREATED);

    let mut roles = vec![
        body_json(first).await["user"]["role"].as_str().unwrap().to_string(),
        body_json(second).await["user"]["role"].as_str().unwrap().to_string(),
    ];
    roles.sort();
    assert_eq!(roles, vec!["admin", "member"]);

    let response = app
        .router
        .oneshot(register_request("third@club.test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["user"]["role"], "member");

    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(admins, 1);
}

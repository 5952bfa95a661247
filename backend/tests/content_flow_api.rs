use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use clubhouse_backend::{models::user::UserRole, repositories::subscriber as subscriber_repo};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

mod support;

use support::{bearer_for, body_json, integration_guard, seed_user, test_app, test_pool};

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn contact_message_is_marked_read_on_first_admin_fetch() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = seed_user(&pool, UserRole::Admin).await;
    let auth = bearer_for(&admin);
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/contact",
            None,
            json!({
                "name": "Ada Lovelace",
                "email": "ada@club.test",
                "subject": "Joining the club",
                "message": "I would love to join the next meetup.",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().expect("id").to_string();
    assert!(created["message"].is_string());

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/contact/{}", id), Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["status"], "read");
    assert!(fetched["read_at"].is_string());

    // Later fetches leave a non-new status alone.
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/contact/{}", id),
            Some(&auth),
            json!({ "status": "archived", "admin_notes": "handled on discord" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .router
        .oneshot(get_request(&format!("/api/contact/{}", id), Some(&auth)))
        .await
        .unwrap();
    let fetched = body_json(response).await;
    assert_eq!(fetched["status"], "archived");
    assert_eq!(fetched["admin_notes"], "handled on discord");
}

#[tokio::test]
async fn members_cannot_reach_admin_routes() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let member = seed_user(&pool, UserRole::Member).await;
    let app = test_app(pool);

    let response = app
        .router
        .oneshot(get_request("/api/contact", Some(&bearer_for(&member))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draft_events_stay_out_of_public_listing() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = seed_user(&pool, UserRole::Admin).await;
    let auth = bearer_for(&admin);
    let app = test_app(pool);
    let marker = Uuid::new_v4().simple().to_string();

    for status in ["draft", "upcoming"] {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/events",
                Some(&auth),
                json!({
                    "title": format!("{} {} night", marker, status),
                    "description": "Talks and pizza",
                    "category": "meetup",
                    "status": status,
                    "event_date": (Utc::now() + Duration::days(10)).to_rfc3339(),
                    "location": "Room 101",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/events?search={}", marker), None))
        .await
        .unwrap();
    let public = body_json(response).await;
    assert_eq!(public["total"], 1);
    assert_eq!(public["items"][0]["status"], "upcoming");

    let response = app
        .router
        .clone()
        .oneshot(get_request(
            &format!("/api/events/admin/all?search={}", marker),
            Some(&auth),
        ))
        .await
        .unwrap();
    let all = body_json(response).await;
    assert_eq!(all["total"], 2);

    // Drafts are addressable by admins only.
    let draft_slug = all["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|event| event["status"] == "draft")
        .and_then(|event| event["slug"].as_str())
        .expect("draft slug")
        .to_string();
    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/events/{}", draft_slug), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .router
        .oneshot(get_request(
            &format!("/api/events/{}", draft_slug),
            Some(&auth),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tip_unique_viewers_count_each_session_once() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = seed_user(&pool, UserRole::Admin).await;
    let auth = bearer_for(&admin);
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tips",
            Some(&auth),
            json!({
                "title": format!("Borrowing {}", Uuid::new_v4().simple()),
                "excerpt": "Lifetimes without tears",
                "content": "<p>Long form content</p>",
                "category": "rust",
                "status": "published",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let tip = body_json(response).await;
    assert!(tip["published_at"].is_string());
    let slug = tip["slug"].as_str().expect("slug").to_string();
    let view_uri = format!("/api/tips/slug/{}/view", slug);

    let mut last = Value::Null;
    for session in ["session-a", "session-a", "session-b"] {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                &view_uri,
                None,
                json!({ "session_id": session }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        last = body_json(response).await;
    }
    assert_eq!(last["views"], 3);
    assert_eq!(last["unique_viewers"], 2);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/tips/slug/no-such-tip/view",
            None,
            json!({ "session_id": "session-a" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .oneshot(get_request(&format!("/api/tips/share/{}", slug), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
}

#[tokio::test]
async fn unsubscribe_token_survives_resubscribe() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let app = test_app(pool.clone());
    let email = format!("{}@club.test", Uuid::new_v4().simple());

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/newsletter/subscribe",
            None,
            json!({ "email": email, "name": "Grace" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/newsletter/subscribe",
            None,
            json!({ "email": email }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let original = subscriber_repo::find_by_email(&pool, &email)
        .await
        .unwrap()
        .expect("subscriber");

    let response = app
        .router
        .clone()
        .oneshot(get_request(
            &format!("/api/newsletter/unsubscribe/{}", original.unsubscribe_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/newsletter/subscribe",
            None,
            json!({ "email": email }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reactivated = subscriber_repo::find_by_email(&pool, &email)
        .await
        .unwrap()
        .expect("subscriber");
    assert_eq!(reactivated.unsubscribe_token, original.unsubscribe_token);
    assert_eq!(reactivated.status.as_str(), "active");
}

#[tokio::test]
async fn anonymous_public_reads_are_not_logged() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/events", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(app.activity.logs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn signed_in_public_read_is_logged_against_the_caller() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let member = seed_user(&pool, UserRole::Member).await;
    let app = test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/events", Some(&bearer_for(&member))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..50 {
        if !app.activity.logs.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let logs = app.activity.logs.lock().unwrap();
    let entry = logs.first().expect("signed-in read logged");
    assert_eq!(entry.user_id.as_deref(), Some(member.id.as_str()));
    assert_eq!(entry.user_email.as_deref(), Some(member.email.as_str()));
    assert_eq!(entry.role, "member");
    assert_eq!(entry.action.as_str(), "view");
    assert_eq!(entry.module.as_str(), "events");
    assert_eq!(entry.status_code, 200);
}

#[tokio::test]
async fn settings_feature_patch_keeps_sibling_keys() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = seed_user(&pool, UserRole::Admin).await;
    let bearer = bearer_for(&admin);
    let app = test_app(pool);

    let baseline = json!({
        "site_name": "Harbour Rowing Club",
        "features": {
            "registrations_open": true,
            "newsletter_enabled": false,
            "tips_enabled": true,
            "gallery_enabled": false,
            "maintenance_mode": false
        }
    });
    let response = app
        .router
        .clone()
        .oneshot(json_request("PUT", "/api/settings", Some(&bearer), baseline))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/settings",
            Some(&bearer),
            json!({ "features": { "maintenance_mode": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["site_name"], "Harbour Rowing Club");
    assert_eq!(body["features"]["maintenance_mode"], true);
    assert_eq!(body["features"]["registrations_open"], true);
    assert_eq!(body["features"]["newsletter_enabled"], false);
    assert_eq!(body["features"]["tips_enabled"], true);
    assert_eq!(body["features"]["gallery_enabled"], false);

    let stored = body_json(
        app.router
            .clone()
            .oneshot(get_request("/api/settings/admin", Some(&bearer)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(stored["features"], body["features"]);
    assert_eq!(stored["site_name"], "Harbour Rowing Club");

    let restore = json!({
        "features": { "newsletter_enabled": true, "gallery_enabled": true, "maintenance_mode": false }
    });
    let response = app
        .router
        .oneshot(json_request("PUT", "/api/settings", Some(&bearer), restore))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn traffic_stats_rejects_unknown_period() {
    let _guard = integration_guard().await;
    let Some(pool) = test_pool().await else {
        return;
    };
    let admin = seed_user(&pool, UserRole::Admin).await;
    let app = test_app(pool);

    let response = app
        .router
        .oneshot(get_request(
            "/api/traffic/stats?period=1y",
            Some(&bearer_for(&admin)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

//! End-to-end tests of the HTTP API against an in-memory SQLite database

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use linkhub::api::create_api_router;
use linkhub::auth::AuthService;
use linkhub::config::CorsConfig;
use linkhub::storage::{SqliteStorage, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_app() -> Router {
    let storage = create_test_storage().await;
    let auth_service = Arc::new(AuthService::new(Arc::clone(&storage)));
    create_api_router(
        storage,
        auth_service,
        &CorsConfig {
            allow_any_origin: true,
        },
    )
}

struct TestResponse {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: String,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// Register a user and return the bearer token (the user id)
async fn register(app: &Router, email: &str) -> String {
    let response = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": email, "password": "hunter2", "name": "Test"})),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    response.json()["user"]["id"].as_str().unwrap().to_string()
}

/// Create a hub and return its id
async fn create_hub(app: &Router, token: &str, body: Value) -> String {
    let response = send(app, Method::POST, "/api/hubs", Some(token), Some(body)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    response.json()["hub"]["id"].as_str().unwrap().to_string()
}

fn titles(links: &Value) -> Vec<String> {
    links
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app().await;
    let response = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["message"], "OK");
}

#[tokio::test]
async fn test_register_login_and_auth() {
    let app = create_app().await;
    let token = register(&app, "ada@example.com").await;

    let duplicate = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "ada@example.com", "password": "other"})),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let missing = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": "bob@example.com"})),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let wrong = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "hunter2"})),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    let user = &login.json()["user"];
    assert_eq!(user["id"], token.as_str());
    assert!(user.get("passwordHash").is_none());

    let anonymous = send(&app, Method::GET, "/api/hubs", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json()["error"], "Unauthorized");

    let bogus = send(&app, Method::GET, "/api/hubs", Some("not-a-user"), None).await;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);

    let ok = send(&app, Method::GET, "/api/hubs", Some(&token), None).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["hubs"], json!([]));
}

#[tokio::test]
async fn test_hub_crud() {
    let app = create_app().await;
    let token = register(&app, "owner@example.com").await;
    let other = register(&app, "other@example.com").await;

    let hub_id = create_hub(
        &app,
        &token,
        json!({
            "title": "My Links",
            "slug": "my-links",
            "links": [
                {"title": "Blog", "url": "https://example.com/blog"},
                {"title": "Shop", "url": "https://example.com/shop", "icon": "🛒"}
            ]
        }),
    )
    .await;

    let taken = send(
        &app,
        Method::POST,
        "/api/hubs",
        Some(&other),
        Some(json!({"title": "Mine", "slug": "my-links"})),
    )
    .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let bad_slug = send(
        &app,
        Method::POST,
        "/api/hubs",
        Some(&token),
        Some(json!({"title": "Bad", "slug": "has spaces"})),
    )
    .await;
    assert_eq!(bad_slug.status, StatusCode::BAD_REQUEST);

    let no_title = send(
        &app,
        Method::POST,
        "/api/hubs",
        Some(&token),
        Some(json!({"slug": "untitled"})),
    )
    .await;
    assert_eq!(no_title.status, StatusCode::BAD_REQUEST);

    let detail = send(&app, Method::GET, &format!("/api/hubs/{hub_id}"), Some(&token), None).await;
    assert_eq!(detail.status, StatusCode::OK);
    let detail = detail.json();
    assert_eq!(detail["hub"]["theme"], "default");
    assert_eq!(titles(&detail["links"]), vec!["Blog", "Shop"]);
    assert_eq!(detail["links"][0]["icon"], "🔗");
    assert_eq!(detail["links"][0]["isActive"], true);
    assert_eq!(detail["links"][1]["position"], 1);

    // Other users cannot see the hub
    let hidden = send(&app, Method::GET, &format!("/api/hubs/{hub_id}"), Some(&other), None).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let blog_id = detail["links"][0]["id"].as_str().unwrap().to_string();
    let updated = send(
        &app,
        Method::PUT,
        &format!("/api/hubs/{hub_id}"),
        Some(&token),
        Some(json!({
            "title": "Renamed",
            "links": [
                {"title": "Podcast", "url": "https://example.com/pod", "position": 1},
                {"id": &blog_id, "title": "Blog", "url": "https://example.com/blog", "position": 0}
            ]
        })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.json()["hub"]["title"], "Renamed");
    assert_eq!(updated.json()["hub"]["slug"], "my-links");

    let detail = send(&app, Method::GET, &format!("/api/hubs/{hub_id}"), Some(&token), None)
        .await
        .json();
    assert_eq!(titles(&detail["links"]), vec!["Blog", "Podcast"]);
    assert_eq!(detail["links"][0]["id"], blog_id.as_str());

    let list = send(&app, Method::GET, "/api/hubs", Some(&token), None).await.json();
    assert_eq!(list["hubs"][0]["linkCount"], 2);
    assert_eq!(list["totalLinks"], 2);
    assert_eq!(list["totalClicks"], 0);

    let deleted = send(&app, Method::DELETE, &format!("/api/hubs/{hub_id}"), Some(&other), None).await;
    assert_eq!(deleted.status, StatusCode::NOT_FOUND);

    let deleted = send(&app, Method::DELETE, &format!("/api/hubs/{hub_id}"), Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["success"], true);

    let public = send(&app, Method::GET, "/api/public/my-links", None, None).await;
    assert_eq!(public.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_move_link() {
    let app = create_app().await;
    let token = register(&app, "mover@example.com").await;
    let hub_id = create_hub(
        &app,
        &token,
        json!({
            "title": "Order",
            "slug": "order",
            "links": [
                {"title": "A", "url": "https://a.example"},
                {"title": "B", "url": "https://b.example"},
                {"title": "C", "url": "https://c.example"}
            ]
        }),
    )
    .await;

    let detail = send(&app, Method::GET, &format!("/api/hubs/{hub_id}"), Some(&token), None)
        .await
        .json();
    let c_id = detail["links"][2]["id"].as_str().unwrap().to_string();
    let a_id = detail["links"][0]["id"].as_str().unwrap().to_string();

    let moved = send(
        &app,
        Method::POST,
        &format!("/api/hubs/{hub_id}/links/{c_id}/move"),
        Some(&token),
        Some(json!({"direction": "up"})),
    )
    .await;
    assert_eq!(moved.status, StatusCode::OK, "{}", moved.body);
    assert_eq!(titles(&moved.json()["links"]), vec!["A", "C", "B"]);

    // Moving the first link up changes nothing
    let unchanged = send(
        &app,
        Method::POST,
        &format!("/api/hubs/{hub_id}/links/{a_id}/move"),
        Some(&token),
        Some(json!({"direction": "up"})),
    )
    .await;
    assert_eq!(titles(&unchanged.json()["links"]), vec!["A", "C", "B"]);

    let public = send(&app, Method::GET, "/api/public/order", None, None).await.json();
    assert_eq!(titles(&public["links"]), vec!["A", "C", "B"]);

    let missing = send(
        &app,
        Method::POST,
        &format!("/api/hubs/{hub_id}/links/nope/move"),
        Some(&token),
        Some(json!({"direction": "down"})),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_page_filters_links() {
    let app = create_app().await;
    let token = register(&app, "public@example.com").await;
    create_hub(
        &app,
        &token,
        json!({
            "title": "Public",
            "slug": "public",
            "description": "Hello",
            "theme": "dark",
            "links": [
                {"title": "Always", "url": "https://always.example"},
                {"title": "Phones", "url": "https://phones.example",
                 "rules": [{"type": "device", "config": {"devices": ["mobile"]}}]},
                {"title": "Off", "url": "https://off.example", "isActive": false},
                {"title": "Somewhere", "url": "https://geo.example",
                 "rules": [{"type": "location", "config": {"countries": ["NZ"]}}]}
            ]
        }),
    )
    .await;

    let desktop = send(&app, Method::GET, "/api/public/public?device=desktop", None, None).await;
    assert_eq!(desktop.status, StatusCode::OK);
    let desktop = desktop.json();
    assert_eq!(desktop["hub"]["title"], "Public");
    assert_eq!(desktop["hub"]["description"], "Hello");
    assert_eq!(desktop["hub"]["theme"], "dark");
    assert_eq!(titles(&desktop["links"]), vec!["Always", "Somewhere"]);
    assert!(desktop["links"][0].get("rules").is_none());

    let phone = send(&app, Method::GET, "/api/public/public?width=375", None, None)
        .await
        .json();
    assert_eq!(titles(&phone["links"]), vec!["Always", "Phones", "Somewhere"]);

    let missing = send(&app, Method::GET, "/api/public/nobody", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["error"], "Hub not found");
}

#[tokio::test]
async fn test_track_and_report() {
    let app = create_app().await;
    let token = register(&app, "stats@example.com").await;
    let hub_id = create_hub(
        &app,
        &token,
        json!({
            "title": "Stats",
            "slug": "stats",
            "links": [
                {"title": "First", "url": "https://first.example"},
                {"title": "Second", "url": "https://second.example"}
            ]
        }),
    )
    .await;
    let detail = send(&app, Method::GET, &format!("/api/hubs/{hub_id}"), Some(&token), None)
        .await
        .json();
    let second_id = detail["links"][1]["id"].as_str().unwrap().to_string();

    let visit = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({"slug": "stats", "eventType": "visit", "deviceType": "mobile"})),
    )
    .await;
    assert_eq!(visit.status, StatusCode::OK, "{}", visit.body);
    assert_eq!(visit.json()["success"], true);

    let click = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({
            "slug": "stats",
            "eventType": "click",
            "linkId": second_id,
            "deviceType": "mobile"
        })),
    )
    .await;
    assert_eq!(click.status, StatusCode::OK);

    let old = (Utc::now() - Duration::days(10)).to_rfc3339();
    let backdated = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({"slug": "stats", "eventType": "visit", "timestamp": old})),
    )
    .await;
    assert_eq!(backdated.status, StatusCode::OK);

    let unknown_hub = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({"slug": "nope", "eventType": "visit"})),
    )
    .await;
    assert_eq!(unknown_hub.status, StatusCode::NOT_FOUND);

    let bad_type = send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({"slug": "stats", "eventType": "hover"})),
    )
    .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);

    for incomplete in [
        json!({"slug": "stats"}),
        json!({"eventType": "visit"}),
        json!({"slug": "", "eventType": "click"}),
    ] {
        let response = send(
            &app,
            Method::POST,
            "/api/analytics/track",
            None,
            Some(incomplete),
        )
        .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", response.body);
        assert_eq!(response.json()["error"], "Slug and eventType are required");
    }

    // Default range is 7d: the backdated visit is excluded
    let week = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(week.status, StatusCode::OK, "{}", week.body);
    let week = week.json();
    assert_eq!(week["range"], "7d");
    assert_eq!(week["totalViews"], 1);
    assert_eq!(week["totalClicks"], 1);
    assert_eq!(week["clickRate"], 100.0);
    assert_eq!(week["linkStats"][0]["title"], "Second");
    assert_eq!(week["linkStats"][0]["clicks"], 1);
    assert_eq!(week["linkStats"][1]["clicks"], 0);
    assert_eq!(week["deviceBreakdown"], json!([{"type": "mobile", "count": 1}]));

    let all = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}?range=all"),
        Some(&token),
        None,
    )
    .await
    .json();
    assert_eq!(all["totalViews"], 2);
    assert_eq!(all["totalClicks"], 1);
    assert_eq!(all["dailyStats"].as_array().unwrap().len(), 2);
    assert_eq!(
        all["deviceBreakdown"],
        json!([{"type": "mobile", "count": 1}, {"type": "unknown", "count": 1}])
    );

    let bad_range = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}?range=90d"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(bad_range.status, StatusCode::BAD_REQUEST);

    let other = register(&app, "snoop@example.com").await;
    let snooping = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(snooping.status, StatusCode::NOT_FOUND);

    let list = send(&app, Method::GET, "/api/hubs", Some(&token), None).await.json();
    assert_eq!(list["hubs"][0]["clickCount"], 1);
    assert_eq!(list["totalClicks"], 1);
}

#[tokio::test]
async fn test_export() {
    let app = create_app().await;
    let token = register(&app, "export@example.com").await;
    let hub_id = create_hub(
        &app,
        &token,
        json!({
            "title": "Export",
            "slug": "export-me",
            "links": [{"title": "Only", "url": "https://only.example"}]
        }),
    )
    .await;

    send(
        &app,
        Method::POST,
        "/api/analytics/track",
        None,
        Some(json!({"slug": "export-me", "eventType": "visit", "deviceType": "tablet"})),
    )
    .await;

    let csv = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}/export?range=all"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(csv.status, StatusCode::OK, "{}", csv.body);
    assert_eq!(
        csv.headers[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        csv.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export-me-analytics-all.csv\""
    );
    assert!(csv.body.starts_with("metric,value\n"));
    assert!(csv.body.contains("total_views,1\n"));
    assert!(csv.body.contains("Only,https://only.example,0\n"));
    assert!(csv.body.contains(",visit,tablet,,\n"));

    // Browser downloads pass the token as a query parameter
    let json_export = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}/export?format=json&authorization={token}"),
        None,
        None,
    )
    .await;
    assert_eq!(json_export.status, StatusCode::OK, "{}", json_export.body);
    assert_eq!(json_export.headers[header::CONTENT_TYPE], "application/json");
    let value = json_export.json();
    assert_eq!(value["hubSlug"], "export-me");
    assert_eq!(value["range"], "7d");
    assert_eq!(value["events"][0]["deviceType"], "tablet");

    let bad_format = send(
        &app,
        Method::GET,
        &format!("/api/analytics/{hub_id}/export?format=xml"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(bad_format.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_page_can_record_visit() {
    let storage = create_test_storage().await;
    let auth_service = Arc::new(AuthService::new(Arc::clone(&storage)));
    let app = create_api_router(
        Arc::clone(&storage),
        auth_service,
        &CorsConfig {
            allow_any_origin: false,
        },
    );

    let token = register(&app, "tracked@example.com").await;
    let hub_id = create_hub(&app, &token, json!({"title": "Tracked", "slug": "tracked"})).await;

    let page = send(
        &app,
        Method::GET,
        "/api/public/tracked?width=800&track=true",
        None,
        None,
    )
    .await;
    assert_eq!(page.status, StatusCode::OK);

    // The visit is written in the background
    let mut events = Vec::new();
    for _ in 0..50 {
        if let Ok(found) = storage.list_events(&hub_id, None).await {
            events = found;
            if !events.is_empty() {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "visit");
    assert_eq!(events[0].device_type, "tablet");
}

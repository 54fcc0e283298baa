use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use tripboard::config::Config;

/// In-memory sqlite gives every pooled connection its own database,
/// so the pool is pinned to a single connection.
async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.server.secure_cookies = false;

    let state = tripboard::api::create_app_state_from_config(config)
        .await
        .expect("Failed to create app state");
    tripboard::api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
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
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(app: &Router, username: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

/// Logs in and returns the session cookie.
async fn login(app: &Router, username: &str, password: &str) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login should set a session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn register_and_login(app: &Router, username: &str) -> String {
    register(app, username).await;
    login(app, username, "hunter2hunter2").await
}

fn future_departure() -> String {
    (Utc::now() + Duration::days(30)).to_rfc3339()
}

async fn create_post(app: &Router, cookie: &str, capacity: i32) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/posts",
        Some(cookie),
        Some(json!({
            "origin": "london",
            "destination": "paris",
            "departure_at": future_departure(),
            "capacity": capacity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "open");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_login_me_flow() {
    let app = spawn_app().await;

    // Protected endpoint without a session
    let (status, _) = send(&app, "GET", "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    register(&app, "alice").await;
    let cookie = login(&app, "alice", "hunter2hunter2").await;

    let (status, body) = send(&app, "GET", "/users/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "user");

    // Logout invalidates the session server-side
    let (status, _) = send(&app, "POST", "/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/users/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let app = spawn_app().await;

    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "bob",
            "email": "not-an-email",
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "short",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = spawn_app().await;

    register(&app, "alice").await;

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bootstrap_admin_can_login() {
    let app = spawn_app().await;

    let cookie = login(&app, "admin", "password").await;

    let (status, body) = send(&app, "GET", "/users/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn test_post_creation_validation() {
    let app = spawn_app().await;
    let cookie = register_and_login(&app, "alice").await;

    // Unauthenticated creation
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        None,
        Some(json!({
            "origin": "london",
            "destination": "paris",
            "departure_at": future_departure(),
            "capacity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Same origin and destination
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        Some(&cookie),
        Some(json!({
            "origin": "paris",
            "destination": "paris",
            "departure_at": future_departure(),
            "capacity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown location
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        Some(&cookie),
        Some(json!({
            "origin": "atlantis",
            "destination": "paris",
            "departure_at": future_departure(),
            "capacity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Departure in the past
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        Some(&cookie),
        Some(json!({
            "origin": "london",
            "destination": "paris",
            "departure_at": (Utc::now() - Duration::days(1)).to_rfc3339(),
            "capacity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Capacity out of range
    let (status, _) = send(
        &app,
        "POST",
        "/posts",
        Some(&cookie),
        Some(json!({
            "origin": "london",
            "destination": "paris",
            "departure_at": future_departure(),
            "capacity": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Valid post
    let id = create_post(&app, &cookie, 3).await;
    let (status, body) = send(&app, "GET", &format!("/{id}/post"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["owner_username"], "alice");
    assert_eq!(body["data"]["origin"], "london");
    assert_eq!(body["data"]["engaged_count"], 0);
    assert_eq!(body["data"]["members"], json!([]));
}

#[tokio::test]
async fn test_join_flow_with_capacity_two() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;
    let post_id = create_post(&app, &alice, 2).await;
    let members_uri = format!("/{post_id}/members");

    // The owner cannot take a seat on their own post
    let (status, _) = send(&app, "POST", &members_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bob = register_and_login(&app, "bob").await;
    let (status, body) = send(&app, "POST", &members_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["engaged_count"], 1);
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["members"], json!(["bob"]));

    // Duplicate join
    let (status, _) = send(&app, "POST", &members_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let carol = register_and_login(&app, "carol").await;
    let (status, body) = send(&app, "POST", &members_uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["engaged_count"], 2);
    assert_eq!(body["data"]["status"], "full");

    // No seats left
    let dave = register_and_login(&app, "dave").await;
    let (status, _) = send(&app, "POST", &members_uri, Some(&dave), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A stranger may not remove someone else's membership
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/members/bob"),
        Some(&dave),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A member may leave on their own
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/members/bob"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["engaged_count"], 1);
    assert_eq!(body["data"]["status"], "open");

    // The owner may remove any member
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/members/carol"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["engaged_count"], 0);

    // Removing a non-member
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/members/carol"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_unknown_post_and_user() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;

    let (status, _) = send(&app, "POST", "/999/members", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let post_id = create_post(&app, &alice, 2).await;

    // Only admins may seat a different user
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{post_id}/members"),
        Some(&alice),
        Some(json!({ "username": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = login(&app, "admin", "password").await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{post_id}/members"),
        Some(&admin),
        Some(json!({ "username": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    register(&app, "bob").await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/{post_id}/members"),
        Some(&admin),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["members"], json!(["bob"]));
}

#[tokio::test]
async fn test_cancel_closes_post_to_changes() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;
    let post_id = create_post(&app, &alice, 3).await;

    let bob = register_and_login(&app, "bob").await;

    // Only the owner or an admin may cancel
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{post_id}/cancel"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/{post_id}/cancel"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "closed");

    // Membership changes are rejected once closed
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{post_id}/members"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Cancelling twice is an invalid state transition
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{post_id}/cancel"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_post_requires_owner_or_admin() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;
    let post_id = create_post(&app, &alice, 3).await;

    let bob = register_and_login(&app, "bob").await;
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/post"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/{post_id}/post"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/{post_id}/post"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // An admin may delete any post
    let other_id = create_post(&app, &alice, 3).await;
    let admin = login(&app, "admin", "password").await;
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/{other_id}/post"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_post_listing_and_owner_view() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let first = create_post(&app, &alice, 2).await;
    create_post(&app, &alice, 3).await;
    create_post(&app, &bob, 4).await;

    // Listing is public
    let (status, body) = send(&app, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, "GET", "/posts?owner=alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/posts?skip=1&limit=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/posts?limit=0", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // All posts by the owner of a given post
    let (status, body) = send(&app, "GET", &format!("/{first}/posts"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let owners: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["owner_username"].as_str().unwrap())
        .collect();
    assert_eq!(owners, vec!["alice", "alice"]);
}

#[tokio::test]
async fn test_user_crud_and_items() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;

    let (status, body) = send(&app, "GET", "/users/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let alice_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, "GET", "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    // Bootstrap admin plus alice
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/users/{alice_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let (status, _) = send(&app, "GET", "/users/999", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Another user may not edit alice
    let bob = register_and_login(&app, "bob").await;
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/users/{alice_id}"),
        Some(&bob),
        Some(json!({ "email": "hijacked@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{alice_id}"),
        Some(&alice),
        Some(json!({ "email": "alice@new.example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alice@new.example.com");

    // Taken username is a conflict
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/users/{alice_id}"),
        Some(&alice),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Items
    let (status, body) = send(
        &app,
        "POST",
        &format!("/users/{alice_id}/items"),
        Some(&alice),
        Some(json!({ "name": "Backpack", "description": "60L", "price": 79.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Backpack");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/{alice_id}/items"),
        Some(&alice),
        Some(json!({ "name": "", "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/users/{alice_id}/items"),
        Some(&bob),
        Some(json!({ "name": "Sneaky", "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/users/{alice_id}/items"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Deleting the account removes it
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/users/{alice_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/users/{alice_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_options() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/capitals-for-select", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let options = body["data"].as_array().unwrap();
    assert_eq!(options.len(), 4);
    assert!(
        options
            .iter()
            .any(|o| o["value"] == "london" && o["label"] == "London")
    );

    let (status, body) = send(&app, "GET", "/permissions-for-select", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let options = body["data"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert!(options.iter().any(|o| o["value"] == "admin"));
}

#[tokio::test]
async fn test_rename_user_who_owns_posts_and_seats() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let alices_post = create_post(&app, &alice, 2).await;
    let bobs_post = create_post(&app, &bob, 2).await;

    // Alice takes a seat on bob's post, then renames herself
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{bobs_post}/members"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, "GET", "/users/me", Some(&alice), None).await;
    let alice_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/users/{alice_id}"),
        Some(&alice),
        Some(json!({"username": "alicia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alicia");

    // Her post and held seat carry the new name
    let (status, body) = send(&app, "GET", &format!("/{alices_post}/post"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["owner_username"], "alicia");

    let (_, body) = send(&app, "GET", &format!("/{bobs_post}/post"), None, None).await;
    assert_eq!(body["data"]["members"], json!(["alicia"]));

    // The session still resolves and management rights followed the rename
    let (status, _) = send(
        &app,
        "POST",
        &format!("/{alices_post}/cancel"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

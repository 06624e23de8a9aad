//! API integration tests
//!
//! Drive the full router over the in-memory directory; no database or SMTP needed.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use shelfshare_server::{
    api::create_router,
    config::AppConfig,
    models::{Loan, User, UserClaims},
    repository::MemoryDirectory,
    services::email::DisabledMailer,
    AppState,
};

const SECRET: &str = "nightly-sweep";

struct TestApp {
    router: Router,
    store: Arc<MemoryDirectory>,
    jwt_secret: String,
}

impl TestApp {
    fn new() -> Self {
        let mut config = AppConfig::default();
        config.reminders.secret = Some(SECRET.to_string());
        let jwt_secret = config.auth.jwt_secret.clone();

        let store = Arc::new(MemoryDirectory::new());
        let state = AppState::new(config, store.clone(), Arc::new(DisabledMailer));

        Self {
            router: create_router(state),
            store,
            jwt_secret,
        }
    }

    fn token(&self, user: &User) -> String {
        tokio_test::assert_ok!(UserClaims::for_user(user, 1).create_token(&self.jwt_secret))
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn befriend(&self, a: &User, b: &User) {
        let (status, request) = self
            .call(
                Method::POST,
                "/api/v1/friends/requests",
                Some(a),
                Some(json!({ "target": b.email })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/v1/friends/requests/{}/accept", request["id"]);
        let (status, body) = self.call(Method::POST, &uri, Some(b), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "applied");
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn test_friend_request_lifecycle() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;
    let bob = app.store.add_user("Bob", "bob@example.com").await;

    let (status, request) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&alice),
            Some(json!({ "target": "Bob@Example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["type"], "FRIEND_REQUEST");
    assert_eq!(request["receiverId"], bob.id);

    // Same pair, either direction
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&bob),
            Some(json!({ "target": alice.id.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/v1/friends/status/{}", bob.id);
    let (_, body) = app.call(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(body["status"], "pending");

    // Only the receiver may accept
    let accept = format!("/api/v1/friends/requests/{}/accept", request["id"]);
    let (status, _) = app.call(Method::POST, &accept, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::POST, &accept, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");

    let (status, body) = app.call(Method::POST, &accept, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_resolved");
    assert_eq!(app.store.friendship_count().await, 1);

    let (_, friends) = app.call(Method::GET, "/api/v1/friends", Some(&alice), None).await;
    assert_eq!(friends, json!([{ "id": bob.id, "displayName": "Bob" }]));

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&alice),
            Some(json!({ "target": "bob@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_friend_request_to_unknown_user() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&alice),
            Some(json!({ "target": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&alice),
            Some(json!({ "target": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;
    let bob = app.store.add_user("Bob", "bob@example.com").await;
    let book = app.store.add_book(alice.id, "Dune", Some("Frank Herbert")).await;

    // Strangers cannot ask
    let request_uri = format!("/api/v1/books/{}/request", book.id);
    let (status, _) = app.call(Method::POST, &request_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.befriend(&alice, &bob).await;

    let (status, request) = app.call(Method::POST, &request_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["type"], "BOOK_REQUEST");
    assert_eq!(request["bookTitle"], "Dune");

    let (status, _) = app.call(Method::POST, &request_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let approve = format!("/api/v1/books/requests/{}/approve", request["id"]);
    let (status, _) = app.call(Method::POST, &approve, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::POST, &approve, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["book"]["borrowerId"], bob.id);
    assert_eq!(body["book"]["status"], "lent");

    let (status, body) = app.call(Method::POST, &approve, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_resolved");

    let (_, borrowed) = app.call(Method::GET, "/api/v1/books/borrowed", Some(&bob), None).await;
    assert_eq!(borrowed.as_array().map(Vec::len), Some(1));
    let (_, lent) = app.call(Method::GET, "/api/v1/books/lent", Some(&alice), None).await;
    assert_eq!(lent[0]["id"], book.id);

    let (_, count) = app
        .call(Method::GET, "/api/v1/notifications/unread-count", Some(&bob), None)
        .await;
    assert_eq!(count["unread"], 1);

    let return_uri = format!("/api/v1/books/{}/return", book.id);
    let (status, returned) = app.call(Method::POST, &return_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "available");
    assert_eq!(returned["borrowerId"], Value::Null);

    let (status, _) = app.call(Method::POST, &return_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, inbox) = app.call(Method::GET, "/api/v1/notifications", Some(&alice), None).await;
    assert_eq!(inbox[0]["type"], "BOOK_RETURNED");
    assert_eq!(inbox[0]["senderId"], bob.id);
}

#[tokio::test]
async fn test_notification_dismiss_and_resolve() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;
    let bob = app.store.add_user("Bob", "bob@example.com").await;

    let (_, request) = app
        .call(
            Method::POST,
            "/api/v1/friends/requests",
            Some(&alice),
            Some(json!({ "target": "bob@example.com" })),
        )
        .await;

    // Requests are not dismissable
    let dismiss = format!("/api/v1/notifications/{}/dismiss", request["id"]);
    let (status, _) = app.call(Method::POST, &dismiss, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let resolve = format!("/api/v1/notifications/{}", request["id"]);
    let (status, _) = app.call(Method::DELETE, &resolve, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::DELETE, &resolve, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");

    let (status, body) = app.call(Method::DELETE, &resolve, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_resolved");
}

#[tokio::test]
async fn test_reminder_sweep_endpoint() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;
    let bob = app.store.add_user("Bob", "bob@example.com").await;
    let book = app.store.add_book(alice.id, "Dune", None).await;
    app.store
        .set_loan(
            book.id,
            Some(Loan {
                borrower_id: bob.id,
                due_date: Utc::now() - Duration::days(2),
            }),
        )
        .await
        .unwrap();

    let (status, _) = app.call(Method::GET, "/api/v1/cron/reminders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::GET, "/api/v1/cron/reminders?secret=guess", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/api/v1/cron/reminders?secret={}", SECRET);
    let (status, report) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["overdueCount"], 1);
    assert_eq!(report["remindersCreated"], 1);

    let (_, report) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(report["overdueCount"], 1);
    assert_eq!(report["remindersCreated"], 0);

    let (_, inbox) = app.call(Method::GET, "/api/v1/notifications", Some(&bob), None).await;
    assert_eq!(inbox[0]["type"], "OVERDUE_REMINDER");
    assert_eq!(inbox[0]["senderId"], alice.id);

    // Dismissing lets the next sweep remind again
    let dismiss = format!("/api/v1/notifications/{}/dismiss", inbox[0]["id"]);
    let (status, _) = app.call(Method::POST, &dismiss, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, report) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(report["remindersCreated"], 1);
}

#[tokio::test]
async fn test_share_link() {
    let app = TestApp::new();
    let alice = app.store.add_user("Alice", "alice@example.com").await;
    app.store.add_book(alice.id, "Dune", None).await;
    app.store.add_book(alice.id, "Emma", None).await;

    let (status, body) = app
        .call(Method::POST, "/api/v1/users/me/share-token", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/shared/{}", token);
    let (status, shelf) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shelf["owner"]["displayName"], "Alice");
    assert_eq!(shelf["books"].as_array().map(Vec::len), Some(2));

    let (status, _) = app
        .call(Method::DELETE, "/api/v1/users/me/share-token", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

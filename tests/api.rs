//! End-to-end tests over the assembled router: registration and login,
//! catalogue CRUD, and the full borrow/return cycle including its
//! failure responses.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_app::modules::{self, AppDeps};
use libris_kernel::settings::Settings;
use libris_kernel::ModuleRegistry;

fn app() -> Router {
    let settings = Settings::default();
    let deps = AppDeps::from_settings(&settings);
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &deps);
    libris_http::build_router(&registry, &settings)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register_and_login(router: &Router, email: &str) -> String {
    let (status, _) = send(
        router,
        post_json(
            "/api/auth/register",
            None,
            json!({"email": email, "password": "correct horse battery", "full_name": "Test Reader"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        router,
        post_json(
            "/api/auth/login",
            None,
            json!({"email": email, "password": "correct horse battery"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_book(router: &Router, token: &str) -> String {
    let (status, author) = send(
        router,
        post_json(
            "/api/authors/",
            Some(token),
            json!({"name": "Octavia E. Butler", "bio": "Science fiction author"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, book) = send(
        router,
        post_json(
            "/api/books/",
            Some(token),
            json!({
                "title": "Kindred",
                "publication_date": "1979",
                "author_id": author["id"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    book["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn healthz_responds_ok() {
    let router = app();
    let (status, _) = send(
        &router,
        Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let router = app();
    register_and_login(&router, "dup@example.com").await;

    let (status, body) = send(
        &router,
        post_json(
            "/api/auth/register",
            None,
            json!({"email": "dup@example.com", "password": "another password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Email already registered");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let router = app();
    register_and_login(&router, "reader@example.com").await;

    let (status, _) = send(
        &router,
        post_json(
            "/api/auth/login",
            None,
            json!({"email": "reader@example.com", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_current_account() {
    let router = app();
    let token = register_and_login(&router, "me@example.com").await;

    let (status, body) = send(&router, get_authed("/api/auth/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "me@example.com");
    assert!(body.get("hashed_password").is_none());
}

#[tokio::test]
async fn lending_requires_authentication() {
    let router = app();
    let (status, _) = send(
        &router,
        post_json(
            "/api/lending/borrow",
            None,
            json!({"book_id": "00000000-0000-0000-0000-000000000000"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_borrow_and_return_cycle() {
    let router = app();
    let token = register_and_login(&router, "cycle@example.com").await;
    let book_id = create_book(&router, &token).await;

    // Borrow: open record, book goes off the shelf.
    let (status, record) = send(
        &router,
        post_json("/api/lending/borrow", Some(&token), json!({"book_id": book_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(record["return_date"].is_null());

    let (status, book) = send(
        &router,
        get_authed(&format!("/api/books/{book_id}"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["available"], false);

    // A second borrow of the same book conflicts.
    let other = register_and_login(&router, "second@example.com").await;
    let (status, body) = send(
        &router,
        post_json("/api/lending/borrow", Some(&other), json!({"book_id": book_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Book is currently not available");

    // Only the borrower may return.
    let record_id = record["id"].as_str().unwrap();
    let (status, _) = send(
        &router,
        post_json(&format!("/api/lending/return/{record_id}"), Some(&other), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The borrower's return closes the record and frees the book.
    let (status, closed) = send(
        &router,
        post_json(&format!("/api/lending/return/{record_id}"), Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!closed["return_date"].is_null());

    let (status, book) = send(
        &router,
        get_authed(&format!("/api/books/{book_id}"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["available"], true);

    // Returning twice conflicts.
    let (status, body) = send(
        &router,
        post_json(&format!("/api/lending/return/{record_id}"), Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Book already returned");

    // History shows the closed loan.
    let (status, history) = send(&router, get_authed("/api/lending/history", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"].as_str().unwrap(), record_id);
}

#[tokio::test]
async fn borrowing_a_missing_book_is_not_found() {
    let router = app();
    let token = register_and_login(&router, "missing@example.com").await;

    let (status, _) = send(
        &router,
        post_json(
            "/api/lending/borrow",
            Some(&token),
            json!({"book_id": "00000000-0000-0000-0000-000000000000"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_patch_cannot_resurrect_availability() {
    let router = app();
    let token = register_and_login(&router, "patcher@example.com").await;
    let book_id = create_book(&router, &token).await;

    let (status, _) = send(
        &router,
        post_json("/api/lending/borrow", Some(&token), json!({"book_id": book_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // `available` in a PATCH body is unknown to the model and ignored;
    // the book stays on loan.
    let patch = Request::builder()
        .method("PATCH")
        .uri(format!("/api/books/{book_id}"))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            serde_json::to_vec(&json!({"title": "Renamed", "available": true})).unwrap(),
        ))
        .unwrap();
    let (status, book) = send(&router, patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Renamed");
    assert_eq!(book["available"], false);
}

//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use bookdesk::config::Config;
use bookdesk::database::{init_db, AppState};
use bookdesk::route::create_app;

pub const LIBRARIAN: (&str, &str) = ("lib-1", "librarian");
pub const ADMIN: (&str, &str) = ("admin-1", "admin");
pub const READER: (&str, &str) = ("reader-1", "user");

/// Creates a test application with a temporary database
pub fn setup_test_app_with(config: Config) -> (axum::Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");
    (create_app(AppState::new(db, config)), temp_db)
}

pub fn setup_test_app() -> (axum::Router, NamedTempFile) {
    setup_test_app_with(Config::default())
}

/// Builds a request with optional identity headers and JSON body
pub fn build_request(
    method: &str,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = actor {
        builder = builder.header("x-user-id", id).header("x-user-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request and returns the status and parsed JSON body
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(build_request(method, uri, actor, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response.into_body()).await)
}

/// Helper function to parse response body as JSON
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

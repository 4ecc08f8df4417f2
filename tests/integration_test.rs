//! Integration tests for the library API
//!
//! These drive the full router: identity extraction, role checks, JSON
//! handling, and the database-backed workflow.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{send, setup_test_app, ADMIN, LIBRARIAN, READER};

/// Creates a book through the API and adds `copies` copies
async fn stocked_book(app: &axum::Router, title: &str, copies: usize) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/books",
        Some(LIBRARIAN),
        Some(json!({ "title": title, "author": "Octavia Butler" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = body["id"].as_str().unwrap().to_string();

    for _ in 0..copies {
        let (status, _) = send(
            app,
            "POST",
            &format!("/api/books/{}/copies", book_id),
            Some(LIBRARIAN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    book_id
}

async fn request_book(app: &axum::Router, actor: (&str, &str), book_id: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/users/issue",
        Some(actor),
        Some(json!({ "book_id": book_id, "duration_days": 14 })),
    )
    .await
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _temp_db) = setup_test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_full_borrow_cycle() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;

    let (status, body) = request_book(&app, READER, &book_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/librarian/pending", Some(LIBRARIAN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["book"]["title"], "Kindred");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/approve", request_id),
        Some(LIBRARIAN),
        Some(json!({ "fine_per_day": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(body["request"]["fine_per_day"], 5);
    assert!(body["request"]["copy_id"].is_string());

    let (_, books) = send(&app, "GET", "/api/books", Some(READER), None).await;
    assert_eq!(books[0]["available_copies"], 0);

    let (status, current) = send(&app, "GET", "/api/users/current", Some(READER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current.as_array().unwrap().len(), 1);
    assert!(current[0]["due_date"].is_string());

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/return", request_id),
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "returned");
    assert_eq!(body["request"]["fine_amount"], 0);
    assert_eq!(body["request"]["fine_paid"], true);

    let (_, books) = send(&app, "GET", "/api/books", Some(READER), None).await;
    assert_eq!(books[0]["available_copies"], 1);

    let (_, past) = send(&app, "GET", "/api/users/past", Some(READER), None).await;
    assert_eq!(past.as_array().unwrap().len(), 1);

    let (_, fines) = send(&app, "GET", "/api/users/fines", Some(READER), None).await;
    assert_eq!(fines["total"], 0);
}

#[tokio::test]
async fn test_approve_without_body_uses_default_rate() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;
    let (_, body) = request_book(&app, READER, &book_id).await;
    let request_id = body["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/approve", request_id),
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["fine_per_day"], 10);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (app, _temp_db) = setup_test_app();
    let (status, body) = send(&app, "GET", "/api/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send(&app, "GET", "/api/books", Some(("reader-1", "janitor")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_are_enforced() {
    let (app, _temp_db) = setup_test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/books",
        Some(READER),
        Some(json!({ "title": "Kindred", "author": "Octavia Butler" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(&app, "GET", "/api/librarian/pending", Some(READER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admins manage the catalog but do not run the desk
    let (status, _) = send(
        &app,
        "POST",
        "/api/books",
        Some(ADMIN),
        Some(json!({ "title": "Dawn", "author": "Octavia Butler" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "GET", "/api/librarian/pending", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_soft_deleted_book_hidden_from_readers() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/books/{}", book_id),
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_id"], book_id.as_str());

    let (_, books) = send(&app, "GET", "/api/books", Some(READER), None).await;
    assert!(books.as_array().unwrap().is_empty());

    let (_, books) = send(&app, "GET", "/api/books", Some(LIBRARIAN), None).await;
    assert_eq!(books[0]["deleted"], true);

    let (status, _) = request_book(&app, READER, &book_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_book_and_search() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindrd", 0).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/books/{}", book_id),
        Some(LIBRARIAN),
        Some(json!({ "title": "Kindred", "author": "Octavia E. Butler" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Kindred");

    let (_, found) = send(&app, "GET", "/api/books?search=KIND", Some(READER), None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    let (_, found) = send(&app, "GET", "/api/books?author=le%20guin", Some(READER), None).await;
    assert!(found.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/books/{}", book_id),
        Some(LIBRARIAN),
        Some(json!({ "title": "", "author": "Octavia E. Butler" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn test_duplicate_request_conflicts() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 2).await;

    let (status, _) = request_book(&app, READER, &book_id).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = request_book(&app, READER, &book_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_approve_without_free_copy_conflicts() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 0).await;
    let (_, body) = request_book(&app, READER, &book_id).await;
    let request_id = body["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/approve", request_id),
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "No available copies for this book");
}

#[tokio::test]
async fn test_reject_after_approve_is_invalid() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;
    let (_, body) = request_book(&app, READER, &book_id).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/approve", request_id),
        Some(LIBRARIAN),
        None,
    )
    .await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/reject", request_id),
        Some(LIBRARIAN),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_state");
}

#[tokio::test]
async fn test_reject_without_reason() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;
    let (_, body) = request_book(&app, READER, &book_id).await;
    let request_id = body["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/librarian/requests/{}/reject", request_id),
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejection_reason"], "No reason provided");
}

#[tokio::test]
async fn test_pay_fines_with_nothing_owed_succeeds() {
    let (app, _temp_db) = setup_test_app();
    let (status, body) = send(&app, "POST", "/api/users/pay-fine", Some(READER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settled"], 0);
}

#[tokio::test]
async fn test_pay_unknown_request_is_not_found() {
    let (app, _temp_db) = setup_test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/users/pay-fine",
        Some(READER),
        Some(json!({ "request_id": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid request ID");
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let (app, _temp_db) = setup_test_app();
    let (status, body) = send(
        &app,
        "PUT",
        "/api/librarian/requests/missing/return",
        Some(LIBRARIAN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_request_longer_than_ten_years_is_rejected() {
    let (app, _temp_db) = setup_test_app();
    let book_id = stocked_book(&app, "Kindred", 1).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/users/issue",
        Some(READER),
        Some(json!({ "book_id": book_id, "duration_days": 4294967295u32 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

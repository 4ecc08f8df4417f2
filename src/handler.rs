//! HTTP request handlers
//!
//! Each handler checks the caller's capability, calls one core operation
//! with the current time, and wraps the result in JSON. Errors are turned
//! into responses by [`LibraryError`]'s `IntoResponse` impl.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::access::{Action, Actor};
use crate::database::AppState;
use crate::error::LibraryError;
use crate::model::{
    ApproveRequest, BookFilter, CreateBookRequest, CreateIssueRequest, EditBookRequest,
    PayFineRequest, RejectRequest,
};
use crate::{catalog, circulation};

type HandlerResult<T> = Result<T, LibraryError>;

/// Liveness check
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Catalog
// =============================================================================

/// Lists books
///
/// # Example Request
///
/// `GET /api/books?search=dune&author=herbert&limit=20`
///
/// Staff see soft-deleted books too.
pub async fn list_books(
    actor: Actor,
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::BrowseCatalog)?;
    let books = catalog::list_books(&state.db, &filter, actor.role.is_staff())?;
    Ok(Json(books))
}

/// Creates a book
///
/// # Request Body
///
/// ```json
/// { "title": "Dune", "author": "Frank Herbert", "cover_image": null }
/// ```
///
/// - **201 Created** - Book added with zero copies
/// - **409 Conflict** - Same title and author already catalogued
pub async fn create_book(
    actor: Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreateBookRequest>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ManageCatalog)?;
    let book = catalog::create_book(&state.db, payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn add_copy(
    actor: Actor,
    Path(book_id): Path<String>,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ManageCatalog)?;
    let copy = catalog::add_copy(&state.db, &book_id, Utc::now())?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book copy added successfully",
            "copy": copy
        })),
    ))
}

pub async fn edit_book(
    actor: Actor,
    Path(book_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<EditBookRequest>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ManageCatalog)?;
    let book = catalog::edit_book(&state.db, &book_id, payload)?;
    Ok(Json(book))
}

pub async fn delete_book(
    actor: Actor,
    Path(book_id): Path<String>,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ManageCatalog)?;
    catalog::delete_book(&state.db, &book_id)?;
    Ok(Json(json!({
        "message": "Book deleted successfully",
        "deleted_id": book_id
    })))
}

// =============================================================================
// Borrowing (any signed-in user)
// =============================================================================

/// Creates a pending issue request for the caller
///
/// # Request Body
///
/// ```json
/// { "book_id": "a1B2c3D4e5F6", "duration_days": 14 }
/// ```
pub async fn create_issue_request(
    actor: Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreateIssueRequest>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::Borrow)?;
    let request = circulation::create_request(&state.db, &actor.id, payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn my_current_issues(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::Borrow)?;
    let views = circulation::user_current_issues(&state.db, &actor.id, Utc::now())?;
    Ok(Json(views))
}

pub async fn my_past_issues(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::Borrow)?;
    let views = circulation::user_past_issues(&state.db, &actor.id, Utc::now())?;
    Ok(Json(views))
}

pub async fn my_fines(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::Borrow)?;
    let summary = circulation::outstanding_fines(&state.db, &actor.id, Utc::now())?;
    Ok(Json(summary))
}

/// Pays one fine (`request_id` given) or all outstanding fines (empty body)
pub async fn pay_fine(
    actor: Actor,
    State(state): State<AppState>,
    payload: Option<Json<PayFineRequest>>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::Borrow)?;
    let now = Utc::now();
    let request_id = payload
        .and_then(|Json(p)| p.request_id)
        .filter(|id| !id.trim().is_empty());

    let body = match request_id {
        Some(request_id) => {
            let (_, amount) = circulation::pay_fine(&state.db, &actor.id, &request_id, now)?;
            json!({
                "message": "Fine paid successfully",
                "settled": 1,
                "amount": amount
            })
        }
        None => {
            let settled = circulation::pay_fines(&state.db, &actor.id, now)?;
            json!({
                "message": "Fines paid successfully",
                "settled": settled
            })
        }
    };
    Ok(Json(body))
}

// =============================================================================
// Librarian
// =============================================================================

pub async fn pending_requests(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    Ok(Json(circulation::pending_requests(&state.db)?))
}

pub async fn current_issues(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    Ok(Json(circulation::current_issues(&state.db, Utc::now())?))
}

pub async fn overdue_requests(
    actor: Actor,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    Ok(Json(circulation::overdue_requests(&state.db, Utc::now())?))
}

/// Approves a pending request
///
/// # Request Body (optional)
///
/// ```json
/// { "fine_per_day": 15 }
/// ```
///
/// Without a rate the configured default applies.
pub async fn approve_request(
    actor: Actor,
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<ApproveRequest>>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    let fine_per_day = payload
        .and_then(|Json(p)| p.fine_per_day)
        .filter(|rate| *rate > 0)
        .unwrap_or(state.config.default_fine_per_day);

    let request = circulation::approve_request(&state.db, &request_id, fine_per_day, Utc::now())?;
    Ok(Json(json!({
        "message": "Request approved",
        "request": request
    })))
}

pub async fn reject_request(
    actor: Actor,
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<RejectRequest>>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    let reason = payload.and_then(|Json(p)| p.reason);
    let request = circulation::reject_request(&state.db, &request_id, reason)?;
    Ok(Json(request))
}

pub async fn mark_returned(
    actor: Actor,
    Path(request_id): Path<String>,
    State(state): State<AppState>,
) -> HandlerResult<impl IntoResponse> {
    actor.authorize(Action::ReviewRequests)?;
    let request = circulation::mark_returned(&state.db, &request_id, Utc::now())?;
    Ok(Json(json!({
        "message": "Book marked as returned",
        "request": request
    })))
}

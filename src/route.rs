//! Route definitions for the library API
//!
//! Maps every endpoint to its handler and wires in the gateway-secret
//! middleware for the `/api` tree.

use axum::routing::{get, post, put};
use axum::{middleware, Router};

use crate::database::AppState;
use crate::handler::{
    add_copy, approve_request, create_book, create_issue_request, current_issues, delete_book,
    edit_book, health, list_books, mark_returned, my_current_issues, my_fines, my_past_issues,
    overdue_requests, pay_fine, pending_requests, reject_request,
};
use crate::middleware::require_api_secret;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /health` - Liveness check (public)
/// - `GET|POST /api/books` - List / create books
/// - `PUT|DELETE /api/books/{id}` - Edit / soft-delete a book
/// - `POST /api/books/{id}/copies` - Add a copy
/// - `POST /api/users/issue` - Request a book
/// - `GET /api/users/current|past|fines` - The caller's loans and fines
/// - `POST /api/users/pay-fine` - Pay one or all fines
/// - `GET /api/librarian/pending|current|overdue` - Librarian dashboards
/// - `PUT /api/librarian/requests/{id}/approve|reject|return` - Workflow actions
///
/// # Example Usage
///
/// ```no_run
/// # use bookdesk::config::Config;
/// # use bookdesk::database::{init_db, AppState};
/// # use bookdesk::route::create_app;
/// # let db = init_db("library.db").unwrap();
/// let state = AppState::new(db, Config::default());
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        // Catalog
        .route("/books", get(list_books).post(create_book))
        .route("/books/{id}", put(edit_book).delete(delete_book))
        .route("/books/{id}/copies", post(add_copy))
        // Borrowing
        .route("/users/issue", post(create_issue_request))
        .route("/users/current", get(my_current_issues))
        .route("/users/past", get(my_past_issues))
        .route("/users/fines", get(my_fines))
        .route("/users/pay-fine", post(pay_fine))
        // Librarian workflow
        .route("/librarian/pending", get(pending_requests))
        .route("/librarian/current", get(current_issues))
        .route("/librarian/overdue", get(overdue_requests))
        .route("/librarian/requests/{id}/approve", put(approve_request))
        .route("/librarian/requests/{id}/reject", put(reject_request))
        .route("/librarian/requests/{id}/return", put(mark_returned))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_secret));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .with_state(state)
}

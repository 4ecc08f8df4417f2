//! Error taxonomy shared by the core and the HTTP boundary
//!
//! Core operations return [`LibraryResult`]; the boundary turns the error
//! into a JSON body and a status code via [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// Duplicate request, no free copy, unpaid fines
    #[error("{0}")]
    Conflict(String),
    /// Action against a request in the wrong status
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    /// Identity missing at the boundary
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    AlreadySettled(String),
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    /// Machine-readable kind, sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            LibraryError::Validation(_) => "validation",
            LibraryError::NotFound(_) => "not_found",
            LibraryError::Conflict(_) => "conflict",
            LibraryError::InvalidState(_) => "invalid_state",
            LibraryError::Forbidden(_) => "forbidden",
            LibraryError::Unauthorized(_) => "unauthorized",
            LibraryError::AlreadySettled(_) => "already_settled",
            LibraryError::Storage(_) | LibraryError::Serialization(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LibraryError::Validation(_)
            | LibraryError::InvalidState(_)
            | LibraryError::AlreadySettled(_) => StatusCode::BAD_REQUEST,
            LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
            LibraryError::Conflict(_) => StatusCode::CONFLICT,
            LibraryError::Forbidden(_) => StatusCode::FORBIDDEN,
            LibraryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LibraryError::Storage(_) | LibraryError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// redb reports each stage with its own error type; funnel them all through
// the umbrella `redb::Error`.
macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for LibraryError {
                fn from(err: $ty) -> Self {
                    LibraryError::Storage(err.into())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            e @ (LibraryError::Storage(_) | LibraryError::Serialization(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected error happened"
                );
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

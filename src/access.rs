//! Role-based access at the HTTP boundary
//!
//! The core operations are role-agnostic. Handlers extract an [`Actor`] from
//! the identity headers set by the upstream auth gateway and call
//! [`Actor::authorize`] before touching the core.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::LibraryError;

/// Header carrying the opaque user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role name
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Librarian,
    Admin,
}

impl Role {
    /// Librarians and admins see soft-deleted books
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Librarian | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            other => Err(LibraryError::Unauthorized(format!("Unknown role {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List and search books
    BrowseCatalog,
    /// Create, edit, delete books; add copies
    ManageCatalog,
    /// Request books, view own loans, pay fines
    Borrow,
    /// Approve, reject, return; librarian dashboards
    ReviewRequests,
}

/// Capability table
pub fn is_allowed(role: Role, action: Action) -> bool {
    match action {
        Action::BrowseCatalog | Action::Borrow => true,
        Action::ManageCatalog => role.is_staff(),
        Action::ReviewRequests => role == Role::Librarian,
    }
}

/// The caller of an API endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn authorize(&self, action: Action) -> Result<(), LibraryError> {
        if is_allowed(self.role, action) {
            Ok(())
        } else {
            tracing::debug!(actor = %self.id, role = ?self.role, ?action, "access denied");
            Err(LibraryError::Forbidden(
                "Access denied: insufficient permissions".to_string(),
            ))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = LibraryError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| LibraryError::Unauthorized("Missing user identity".to_string()))?;
        // ':' separates the segments of storage index keys
        if id.contains(':') {
            return Err(LibraryError::Unauthorized("Malformed user identity".to_string()));
        }
        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| LibraryError::Unauthorized("Missing user role".to_string()))?
            .parse()?;

        Ok(Actor {
            id: id.to_string(),
            role,
        })
    }
}

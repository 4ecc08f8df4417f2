//! Data models for the library service
//!
//! Stored records (books, copies, issue requests) plus the request and
//! response payloads used by the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cover used when a book is created without one
pub const PLACEHOLDER_COVER: &str = "https://via.placeholder.com/200x300?text=No+Cover";

/// A catalog entry for one title
///
/// `available_copies` always equals the number of this book's copies with
/// `is_issued == false`; every operation that flips a copy adjusts it in the
/// same transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub available_copies: u32,
    /// Soft delete flag; deleted books are hidden from regular users
    #[serde(default)]
    pub deleted: bool,
    pub cover_image: String,
    pub pdf: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Short form of a book embedded in issue request views
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        BookSummary {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
        }
    }
}

/// One physical lending unit of a book
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BookCopy {
    pub id: String,
    pub book_id: String,
    #[serde(default)]
    pub is_issued: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::Approved => "approved",
            IssueStatus::Rejected => "rejected",
            IssueStatus::Returned => "returned",
        }
    }
}

/// The borrow workflow record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssueRequest {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    /// Bound on approval
    pub copy_id: Option<String>,
    pub duration_days: u32,
    /// When the user asked for the book
    pub requested_at: DateTime<Utc>,
    /// When a librarian approved it; the due date counts from here
    pub issued_at: Option<DateTime<Utc>>,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub rejection_reason: Option<String>,
    pub fine_per_day: u32,
    /// Total accrued so far, including any part already paid
    #[serde(default)]
    pub fine_amount: u64,
    /// Part of `fine_amount` already collected
    #[serde(default)]
    pub fine_settled: u64,
    #[serde(default)]
    pub fine_paid: bool,
}

impl IssueRequest {
    /// A fine has accrued and has not been settled
    pub fn has_outstanding_fine(&self) -> bool {
        self.outstanding_fine() > 0
    }

    /// Amount still owed
    pub fn outstanding_fine(&self) -> u64 {
        if self.fine_paid {
            0
        } else {
            self.fine_amount.saturating_sub(self.fine_settled)
        }
    }

    /// Pending or approved: the user still holds (or waits for) the book
    pub fn is_active(&self) -> bool {
        matches!(self.status, IssueStatus::Pending | IssueStatus::Approved)
    }
}

/// An issue request joined with its book and due date
#[derive(Serialize, Debug, Clone)]
pub struct IssueRequestView {
    #[serde(flatten)]
    pub request: IssueRequest,
    /// `None` if the book record has disappeared
    pub book: Option<BookSummary>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Outstanding fines of one user
#[derive(Serialize, Debug, Clone)]
pub struct FineSummary {
    pub total: u64,
    pub requests: Vec<IssueRequestView>,
}

// =============================================================================
// Request payloads
// =============================================================================

#[derive(Deserialize, Debug, Clone)]
pub struct CreateBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Optional cover URL; the placeholder is used when absent
    pub cover_image: Option<String>,
    pub pdf: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EditBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
}

/// Query parameters for listing books
///
/// # Example
/// Query string: `?search=dune&author=herbert&limit=20`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookFilter {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Maximum number of books returned; 0 or absent means no limit
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateIssueRequest {
    #[serde(default)]
    pub book_id: String,
    #[serde(default)]
    pub duration_days: u32,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ApproveRequest {
    /// Overrides the configured default; zero is treated as absent
    pub fine_per_day: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PayFineRequest {
    /// Settle a single request; absent settles every outstanding fine
    pub request_id: Option<String>,
}

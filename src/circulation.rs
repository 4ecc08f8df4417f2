//! Issue request lifecycle
//!
//! `pending` → `approved` | `rejected`, `approved` → `returned`.
//!
//! Each operation runs in one redb write transaction: the copy flip, the
//! book counter and the request update commit together or not at all.
//! Returning early with an error drops the transaction uncommitted.
//! Reads that expose fines recompute them first and persist the result in
//! the same transaction.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, Table};

use crate::database::{
    group_key, group_values, load, load_all, load_group, new_id, store, TABLE_BOOKS, TABLE_COPIES,
    TABLE_REQUESTS, TABLE_USER_REQUESTS,
};
use crate::error::{LibraryError, LibraryResult};
use crate::fine;
use crate::model::{
    Book, BookCopy, CreateIssueRequest, FineSummary, IssueRequest, IssueRequestView, IssueStatus,
};

const DEFAULT_REJECTION_REASON: &str = "No reason provided";

type JsonTable<'txn> = Table<'txn, &'static str, &'static str>;

fn request_not_found(request_id: &str) -> LibraryError {
    LibraryError::NotFound(format!("Request {} not found", request_id))
}

fn user_index_key(request: &IssueRequest) -> String {
    format!(
        "{}:{}:{}",
        request.user_id,
        request.requested_at.timestamp_micros(),
        request.id
    )
}

/// All requests of one user, oldest first
fn requests_of_user<I, R>(index: &I, requests: &R, user_id: &str) -> LibraryResult<Vec<IssueRequest>>
where
    I: ReadableTable<&'static str, &'static str>,
    R: ReadableTable<&'static str, &'static str>,
{
    let mut found = Vec::new();
    for request_id in group_values(index, user_id)? {
        if let Some(request) = load(requests, &request_id)? {
            found.push(request);
        }
    }
    Ok(found)
}

/// Runs the fine calculator and saves the request if it changed
fn refresh_fine(
    requests: &mut JsonTable<'_>,
    request: &mut IssueRequest,
    now: DateTime<Utc>,
) -> LibraryResult<()> {
    if fine::assess(request, now) {
        store(requests, &request.id, &*request)?;
        tracing::debug!(
            request_id = %request.id,
            fine_amount = request.fine_amount,
            fine_paid = request.fine_paid,
            "fine updated"
        );
    }
    Ok(())
}

fn to_view<R>(books: &R, request: IssueRequest) -> LibraryResult<IssueRequestView>
where
    R: ReadableTable<&'static str, &'static str>,
{
    let book: Option<Book> = load(books, &request.book_id)?;
    Ok(IssueRequestView {
        due_date: fine::request_due_date(&request),
        book: book.as_ref().map(Into::into),
        request,
    })
}

/// A user asks to borrow a book.
///
/// Fails with `Validation` on a blank book id or a duration outside
/// `1..=MAX_DURATION_DAYS`, `NotFound`
/// for a missing or deleted book, and `Conflict` when the user already has
/// an active request for the book or owes a fine on a returned one.
pub fn create_request(
    db: &Database,
    user_id: &str,
    payload: CreateIssueRequest,
    now: DateTime<Utc>,
) -> LibraryResult<IssueRequest> {
    if user_id.trim().is_empty() {
        return Err(LibraryError::Validation("User ID required".to_string()));
    }
    let book_id = payload.book_id.trim();
    if book_id.is_empty() {
        return Err(LibraryError::Validation("Book ID required".to_string()));
    }
    if payload.duration_days == 0 {
        return Err(LibraryError::Validation(
            "Duration must be at least one day".to_string(),
        ));
    }
    if payload.duration_days > fine::MAX_DURATION_DAYS {
        return Err(LibraryError::Validation(format!(
            "Duration cannot exceed {} days",
            fine::MAX_DURATION_DAYS
        )));
    }

    let write_txn = db.begin_write()?;
    let request = {
        let books = write_txn.open_table(TABLE_BOOKS)?;
        match load::<Book, _>(&books, book_id)? {
            Some(book) if !book.deleted => {}
            _ => return Err(LibraryError::NotFound(format!("Book with id {} not found", book_id))),
        }

        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let mut index = write_txn.open_table(TABLE_USER_REQUESTS)?;
        let existing = requests_of_user(&index, &requests, user_id)?;

        if existing.iter().any(|r| r.book_id == book_id && r.is_active()) {
            return Err(LibraryError::Conflict(
                "You already have a pending or approved request for this book.".to_string(),
            ));
        }
        for mut past in existing {
            refresh_fine(&mut requests, &mut past, now)?;
            if past.status == IssueStatus::Returned && past.has_outstanding_fine() {
                return Err(LibraryError::Conflict(
                    "You have pending fines. Please pay them before issuing a new book.".to_string(),
                ));
            }
        }

        let request = IssueRequest {
            id: new_id(),
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            copy_id: None,
            duration_days: payload.duration_days,
            requested_at: now,
            issued_at: None,
            actual_return_date: None,
            status: IssueStatus::Pending,
            rejection_reason: None,
            fine_per_day: fine::DEFAULT_FINE_PER_DAY,
            fine_amount: 0,
            fine_settled: 0,
            fine_paid: false,
        };
        store(&mut requests, &request.id, &request)?;
        index.insert(user_index_key(&request).as_str(), request.id.as_str())?;
        request
    };
    write_txn.commit()?;

    tracing::info!(request_id = %request.id, user_id, book_id, "issue request created");
    Ok(request)
}

/// A librarian approves a pending request, binding one free copy.
///
/// The copy is claimed only after the user's fines are brought up to date;
/// any outstanding fine blocks the approval.
pub fn approve_request(
    db: &Database,
    request_id: &str,
    fine_per_day: u32,
    now: DateTime<Utc>,
) -> LibraryResult<IssueRequest> {
    let write_txn = db.begin_write()?;
    let request = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let mut request: IssueRequest =
            load(&requests, request_id)?.ok_or_else(|| request_not_found(request_id))?;
        if request.status != IssueStatus::Pending {
            return Err(LibraryError::InvalidState(format!(
                "Request is not pending (status: {})",
                request.status.as_str()
            )));
        }

        let index = write_txn.open_table(TABLE_USER_REQUESTS)?;
        for mut other in requests_of_user(&index, &requests, &request.user_id)? {
            refresh_fine(&mut requests, &mut other, now)?;
            if other.has_outstanding_fine() {
                return Err(LibraryError::Conflict("User has unpaid fines".to_string()));
            }
        }

        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let mut book: Book = load(&books, &request.book_id)?.ok_or_else(|| {
            LibraryError::NotFound(format!("Book with id {} not found", request.book_id))
        })?;

        let mut copies = write_txn.open_table(TABLE_COPIES)?;
        let free_copy = load_group::<BookCopy, _>(&copies, &book.id)?
            .into_iter()
            .find(|c| !c.is_issued);
        let (mut copy, remaining) = match (free_copy, book.available_copies.checked_sub(1)) {
            (Some(copy), Some(remaining)) => (copy, remaining),
            _ => {
                tracing::debug!(request_id, book_id = %book.id, "no free copy to approve with");
                return Err(LibraryError::Conflict(
                    "No available copies for this book".to_string(),
                ));
            }
        };

        copy.is_issued = true;
        store(&mut copies, &group_key(&book.id, &copy.id), &copy)?;

        book.available_copies = remaining;
        store(&mut books, &book.id, &book)?;

        request.copy_id = Some(copy.id);
        request.status = IssueStatus::Approved;
        request.fine_per_day = fine_per_day;
        request.issued_at = Some(now);
        store(&mut requests, &request.id, &request)?;
        request
    };
    write_txn.commit()?;

    tracing::info!(
        request_id,
        copy_id = request.copy_id.as_deref().unwrap_or_default(),
        "issue request approved"
    );
    Ok(request)
}

/// A librarian turns down a pending request. No copy or book changes.
pub fn reject_request(
    db: &Database,
    request_id: &str,
    reason: Option<String>,
) -> LibraryResult<IssueRequest> {
    let write_txn = db.begin_write()?;
    let request = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let mut request: IssueRequest =
            load(&requests, request_id)?.ok_or_else(|| request_not_found(request_id))?;
        if request.status != IssueStatus::Pending {
            return Err(LibraryError::InvalidState(format!(
                "Request is not pending (status: {})",
                request.status.as_str()
            )));
        }

        request.status = IssueStatus::Rejected;
        request.rejection_reason = Some(
            reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
        );
        store(&mut requests, &request.id, &request)?;
        request
    };
    write_txn.commit()?;

    tracing::info!(request_id, "issue request rejected");
    Ok(request)
}

/// A librarian takes the book back: frees the copy and settles the fine.
pub fn mark_returned(db: &Database, request_id: &str, now: DateTime<Utc>) -> LibraryResult<IssueRequest> {
    let write_txn = db.begin_write()?;
    let request = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let mut request: IssueRequest =
            load(&requests, request_id)?.ok_or_else(|| request_not_found(request_id))?;
        if request.status != IssueStatus::Approved {
            return Err(LibraryError::InvalidState(format!(
                "Request is not approved (status: {})",
                request.status.as_str()
            )));
        }

        if let Some(copy_id) = &request.copy_id {
            let mut copies = write_txn.open_table(TABLE_COPIES)?;
            let copy_key = group_key(&request.book_id, copy_id);
            let copy: Option<BookCopy> = load(&copies, &copy_key)?;
            match copy {
                Some(mut copy) if copy.is_issued => {
                    copy.is_issued = false;
                    store(&mut copies, &copy_key, &copy)?;

                    let mut books = write_txn.open_table(TABLE_BOOKS)?;
                    if let Some(mut book) = load::<Book, _>(&books, &request.book_id)? {
                        book.available_copies += 1;
                        store(&mut books, &book.id, &book)?;
                    }
                }
                _ => tracing::warn!(request_id, copy_id = %copy_id, "bound copy missing or already free"),
            }
        }

        request.actual_return_date = Some(now);
        request.status = IssueStatus::Returned;
        fine::assess(&mut request, now);
        store(&mut requests, &request.id, &request)?;
        request
    };
    write_txn.commit()?;

    tracing::info!(
        request_id,
        fine_amount = request.fine_amount,
        "book marked as returned"
    );
    Ok(request)
}

/// Pending requests, oldest first
pub fn pending_requests(db: &Database) -> LibraryResult<Vec<IssueRequestView>> {
    let read_txn = db.begin_read()?;
    let requests = read_txn.open_table(TABLE_REQUESTS)?;
    let books = read_txn.open_table(TABLE_BOOKS)?;

    let mut pending: Vec<IssueRequest> = load_all::<IssueRequest, _>(&requests)?
        .into_iter()
        .filter(|r| r.status == IssueStatus::Pending)
        .collect();
    pending.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));

    let views = pending
        .into_iter()
        .map(|r| to_view(&books, r))
        .collect::<LibraryResult<Vec<_>>>()?;
    Ok(views)
}

/// Loads requests (all, or one user's), refreshes their fines, and returns
/// those matching `keep` in chronological order.
fn refreshed_views<F>(
    db: &Database,
    user_id: Option<&str>,
    now: DateTime<Utc>,
    keep: F,
) -> LibraryResult<Vec<IssueRequestView>>
where
    F: Fn(&IssueRequest) -> bool,
{
    let write_txn = db.begin_write()?;
    let views = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let books = write_txn.open_table(TABLE_BOOKS)?;

        let mut candidates = match user_id {
            Some(user_id) => {
                let index = write_txn.open_table(TABLE_USER_REQUESTS)?;
                requests_of_user(&index, &requests, user_id)?
            }
            None => load_all(&requests)?,
        };
        candidates.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));

        let mut views = Vec::new();
        for mut request in candidates {
            refresh_fine(&mut requests, &mut request, now)?;
            if keep(&request) {
                views.push(to_view(&books, request)?);
            }
        }
        views
    };
    write_txn.commit()?;
    Ok(views)
}

fn is_overdue(request: &IssueRequest, now: DateTime<Utc>) -> bool {
    request.status == IssueStatus::Approved
        && fine::request_due_date(request).is_some_and(|due| due < now)
}

/// Every book currently out on loan
pub fn current_issues(db: &Database, now: DateTime<Utc>) -> LibraryResult<Vec<IssueRequestView>> {
    refreshed_views(db, None, now, |r| r.status == IssueStatus::Approved)
}

/// Approved requests past their due date
pub fn overdue_requests(db: &Database, now: DateTime<Utc>) -> LibraryResult<Vec<IssueRequestView>> {
    refreshed_views(db, None, now, |r| is_overdue(r, now))
}

pub fn user_current_issues(
    db: &Database,
    user_id: &str,
    now: DateTime<Utc>,
) -> LibraryResult<Vec<IssueRequestView>> {
    refreshed_views(db, Some(user_id), now, |r| r.status == IssueStatus::Approved)
}

pub fn user_past_issues(
    db: &Database,
    user_id: &str,
    now: DateTime<Utc>,
) -> LibraryResult<Vec<IssueRequestView>> {
    refreshed_views(db, Some(user_id), now, |r| {
        matches!(r.status, IssueStatus::Returned | IssueStatus::Rejected)
    })
}

pub fn outstanding_fines(db: &Database, user_id: &str, now: DateTime<Utc>) -> LibraryResult<FineSummary> {
    let requests = refreshed_views(db, Some(user_id), now, IssueRequest::has_outstanding_fine)?;
    let total = requests.iter().map(|v| v.request.outstanding_fine()).sum();
    Ok(FineSummary { total, requests })
}

/// Settles every outstanding fine of the user. Returns how many requests
/// were settled; zero is not an error.
pub fn pay_fines(db: &Database, user_id: &str, now: DateTime<Utc>) -> LibraryResult<usize> {
    let write_txn = db.begin_write()?;
    let settled = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let index = write_txn.open_table(TABLE_USER_REQUESTS)?;

        let mut settled = 0;
        for mut request in requests_of_user(&index, &requests, user_id)? {
            let mut changed = fine::assess(&mut request, now);
            if request.has_outstanding_fine() {
                fine::settle(&mut request);
                settled += 1;
                changed = true;
            }
            if changed {
                store(&mut requests, &request.id, &request)?;
            }
        }
        settled
    };
    write_txn.commit()?;

    tracing::info!(user_id, settled, "fines paid");
    Ok(settled)
}

/// Settles the fine of a single request owned by the user. Returns the
/// request and the amount collected by this payment.
pub fn pay_fine(
    db: &Database,
    user_id: &str,
    request_id: &str,
    now: DateTime<Utc>,
) -> LibraryResult<(IssueRequest, u64)> {
    let write_txn = db.begin_write()?;
    let (request, collected) = {
        let mut requests = write_txn.open_table(TABLE_REQUESTS)?;
        let mut request = match load::<IssueRequest, _>(&requests, request_id)? {
            Some(r) if r.user_id == user_id => r,
            _ => return Err(LibraryError::NotFound("Invalid request ID".to_string())),
        };

        fine::assess(&mut request, now);
        if request.fine_paid {
            return Err(LibraryError::AlreadySettled("Fine already paid".to_string()));
        }
        if request.outstanding_fine() == 0 {
            return Err(LibraryError::AlreadySettled(
                "No fine is owed on this request".to_string(),
            ));
        }

        let collected = fine::settle(&mut request);
        store(&mut requests, &request.id, &request)?;
        (request, collected)
    };
    write_txn.commit()?;

    tracing::info!(user_id, request_id, amount = collected, "fine paid");
    Ok((request, collected))
}

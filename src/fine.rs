//! Overdue fine calculation
//!
//! Pure functions over an [`IssueRequest`]; callers decide when to persist
//! the result. The due date counts from approval (`issued_at`). A fine is
//! never recomputed downward once paid; further late days reopen it with
//! the paid part kept in `fine_settled`.

use chrono::{DateTime, Duration, Utc};

use crate::model::{IssueRequest, IssueStatus};

/// Rate used when a librarian approves without naming one
pub const DEFAULT_FINE_PER_DAY: u32 = 10;

/// Longest loan a user may ask for (ten years)
pub const MAX_DURATION_DAYS: u32 = 3650;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// `None` when the date falls outside chrono's representable range
pub fn due_date(issued_at: DateTime<Utc>, duration_days: u32) -> Option<DateTime<Utc>> {
    issued_at.checked_add_signed(Duration::days(i64::from(duration_days)))
}

/// Whole days past `due`, rounding any partial day up
pub fn days_late(due: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let late_ms = now.signed_duration_since(due).num_milliseconds();
    if late_ms <= 0 {
        return 0;
    }
    // ceil without floating point
    (late_ms / DAY_MILLIS + i64::from(late_ms % DAY_MILLIS != 0)) as u64
}

/// Due date of an approved or returned request
pub fn request_due_date(request: &IssueRequest) -> Option<DateTime<Utc>> {
    request
        .issued_at
        .and_then(|issued| due_date(issued, request.duration_days))
}

/// Recomputes `fine_amount` / `fine_paid` as of `now`.
///
/// Returns `true` when the request was modified and needs saving. Calling it
/// again with the same `now` is a no-op.
pub fn assess(request: &mut IssueRequest, now: DateTime<Utc>) -> bool {
    let Some(due) = request_due_date(request) else {
        return false;
    };

    let (clock, returned) = match request.status {
        IssueStatus::Approved => (now, false),
        // the clock stops once the book is back
        IssueStatus::Returned => (request.actual_return_date.unwrap_or(now), true),
        IssueStatus::Pending | IssueStatus::Rejected => return false,
    };

    let late = days_late(due, clock);
    let total = late.saturating_mul(u64::from(request.fine_per_day));

    let (amount, paid) = if request.fine_paid {
        // only days accrued after the last payment reopen a settled fine
        if total <= request.fine_settled {
            return false;
        }
        (total, false)
    } else if late > 0 {
        (total.max(request.fine_settled), total <= request.fine_settled)
    } else if returned || request.fine_amount > request.fine_settled {
        (request.fine_settled, true)
    } else {
        return false;
    };

    if request.fine_amount == amount && request.fine_paid == paid {
        return false;
    }
    request.fine_amount = amount;
    request.fine_paid = paid;
    true
}

/// Marks the whole accrued fine as paid. Returns the amount collected now.
pub fn settle(request: &mut IssueRequest) -> u64 {
    let collected = request.outstanding_fine();
    request.fine_settled = request.fine_amount;
    request.fine_paid = true;
    collected
}

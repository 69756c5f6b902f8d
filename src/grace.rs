//! Grace-period evaluation: pure date math, no I/O.
//!
//! The one numeric edge case in the engine lives here: an item due exactly
//! N whole days ago has `days_overdue == N` and does NOT exceed an N-day
//! grace period (strict `>`).

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a stored due date. Accepts RFC 3339 timestamps and bare
/// `YYYY-MM-DD` dates (interpreted as midnight UTC). Returns `None` for
/// anything else — callers treat unparseable dates as "no due date".
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Whole days an item is overdue: the ceiling of the elapsed time between
/// `due` and `now`, in days. Zero when the due date is now or in the future.
pub fn days_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed_secs = (now - due).num_seconds();
    if elapsed_secs <= 0 {
        return 0;
    }
    // Ceiling division: 1 second overdue counts as day 1.
    (elapsed_secs + 86_399) / 86_400
}

/// Whether an overdue item has exhausted its grace period.
///
/// Strict comparison: due exactly `grace_days` ago is still within grace.
pub fn has_exceeded_grace(due: DateTime<Utc>, now: DateTime<Utc>, grace_days: i64) -> bool {
    days_overdue(due, now) > grace_days
}

//! Error taxonomy for the risk monitor.
//!
//! The monitor is a background advisory process: errors here are
//! operator-visible (logged) but never user-facing hard failures. The
//! classification helpers tell the loop which failures abort a pass and
//! which degrade locally.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Threshold lookup failed; recovered by substituting system defaults.
    #[error("Risk policy unavailable, using defaults: {0}")]
    ConfigUnavailable(#[source] DbError),

    /// Overdue query failed; the pass aborts without raising any alert —
    /// never claim risk when the data could not be confirmed.
    #[error("Overdue scan failed: {0}")]
    Scan(#[source] DbError),

    /// Bulk ownership transfer failed; nothing was committed.
    #[error("Reassignment failed, no items were moved: {0}")]
    Reassignment(#[source] DbError),

    /// Alert persistence failed; logged only, never rolls back prior stages.
    #[error("Notification delivery failed: {0}")]
    Notification(#[source] DbError),

    /// A policy update violated a cross-field invariant.
    #[error("Invalid threshold configuration: {0}")]
    Validation(String),

    /// The pass exceeded its time budget and was abandoned. Retried only on
    /// the next triggering event.
    #[error("Risk pass timed out after {0} seconds")]
    Timeout(u64),

    /// The pass observed its cancellation flag and stopped before the next
    /// mutating stage.
    #[error("Risk pass cancelled before completing")]
    Cancelled,
}

impl MonitorError {
    /// Whether this failure aborts the in-flight pass. Config and
    /// notification failures degrade locally instead.
    pub fn aborts_pass(&self) -> bool {
        matches!(
            self,
            MonitorError::Scan(_)
                | MonitorError::Reassignment(_)
                | MonitorError::Timeout(_)
                | MonitorError::Cancelled
        )
    }
}

impl From<DbError> for MonitorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidThresholds(msg) => MonitorError::Validation(msg),
            other => MonitorError::Scan(other),
        }
    }
}

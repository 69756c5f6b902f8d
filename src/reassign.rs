//! Ownership transfer of long-overdue items to the backup owner.
//!
//! The transfer and its audit record are one logical operation: both writes
//! run in a single SQLite transaction, so a partially applied batch (owner
//! changed without an audit row, or the reverse) cannot be observed.

use chrono::{DateTime, Utc};

use crate::db::{DbAuditRecord, DbWorkItem, RiskDb};
use crate::error::MonitorError;

/// Result of one reassignment batch.
#[derive(Debug, Clone, Default)]
pub struct ReassignmentOutcome {
    /// Ids of items whose ownership actually transferred, in input order.
    pub reassigned: Vec<String>,
    /// Items skipped because the backup already owned them.
    pub skipped_already_backup: usize,
}

impl ReassignmentOutcome {
    pub fn count(&self) -> usize {
        self.reassigned.len()
    }
}

/// Transfer the given overdue items to `backup_assignee_id`, writing one
/// audit record per transferred item.
///
/// Idempotent with respect to ownership: an item already owned by the backup
/// is skipped, so re-running the engine on the same overdue set is a no-op
/// for already-transferred items. On any failure the whole batch rolls back
/// and no transfer is claimed.
pub fn reassign_overdue(
    db: &RiskDb,
    entity_id: &str,
    items: &[DbWorkItem],
    backup_assignee_id: &str,
    grace_days: i64,
    now: DateTime<Utc>,
) -> Result<ReassignmentOutcome, MonitorError> {
    let mut outcome = ReassignmentOutcome::default();

    // Previous owners are captured before any mutation.
    let mut to_transfer: Vec<&DbWorkItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.owner_id.as_deref() == Some(backup_assignee_id) {
            outcome.skipped_already_backup += 1;
            continue;
        }
        to_transfer.push(item);
    }

    if to_transfer.is_empty() {
        return Ok(outcome);
    }

    let reason = format!("exceeded {}-day grace period", grace_days);
    let created_at = now.to_rfc3339();
    let item_ids: Vec<String> = to_transfer.iter().map(|i| i.id.clone()).collect();

    db.with_transaction(|db| {
        db.reassign_items(&item_ids, backup_assignee_id)?;
        for item in &to_transfer {
            db.append_reassignment(&DbAuditRecord {
                id: String::new(),
                entity_id: entity_id.to_string(),
                item_id: item.id.clone(),
                item_title: item.title.clone(),
                item_priority: item.priority.clone(),
                previous_owner_id: item.owner_id.clone(),
                new_owner_id: backup_assignee_id.to_string(),
                reason: reason.clone(),
                created_at: created_at.clone(),
            })?;
        }
        Ok(())
    })
    .map_err(MonitorError::Reassignment)?;

    log::info!(
        "Reassigned {} overdue item(s) for entity {} to backup {}",
        item_ids.len(),
        entity_id,
        backup_assignee_id
    );

    outcome.reassigned = item_ids;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use chrono::Duration;

    fn seed_item(db: &RiskDb, id: &str, owner: Option<&str>) -> DbWorkItem {
        let now = RiskDb::now_rfc3339();
        let item = DbWorkItem {
            id: id.to_string(),
            entity_id: "e1".to_string(),
            title: format!("Task {}", id),
            priority: "high".to_string(),
            status: "pending".to_string(),
            due_date: Some((Utc::now() - Duration::days(5)).to_rfc3339()),
            owner_id: owner.map(|s| s.to_string()),
            created_at: now.clone(),
            updated_at: now,
        };
        db.upsert_work_item(&item).unwrap();
        item
    }

    #[test]
    fn test_transfer_writes_owner_and_audit_together() {
        let db = test_db();
        let item = seed_item(&db, "t1", Some("u1"));

        let outcome =
            reassign_overdue(&db, "e1", &[item], "u2", 3, Utc::now()).unwrap();
        assert_eq!(outcome.count(), 1);
        assert_eq!(outcome.reassigned, vec!["t1".to_string()]);

        let stored = db.get_work_item("t1").unwrap().unwrap();
        assert_eq!(stored.owner_id.as_deref(), Some("u2"));

        let audit = db.list_reassignments("e1").unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].previous_owner_id.as_deref(), Some("u1"));
        assert_eq!(audit[0].new_owner_id, "u2");
        assert_eq!(audit[0].reason, "exceeded 3-day grace period");
    }

    #[test]
    fn test_second_run_is_noop() {
        let db = test_db();
        let item = seed_item(&db, "t1", Some("u1"));

        reassign_overdue(&db, "e1", &[item], "u2", 3, Utc::now()).unwrap();

        // Re-scan picks up the item with its new owner
        let rescanned = db.get_work_item("t1").unwrap().unwrap();
        let outcome =
            reassign_overdue(&db, "e1", &[rescanned], "u2", 3, Utc::now()).unwrap();

        assert_eq!(outcome.count(), 0);
        assert_eq!(outcome.skipped_already_backup, 1);
        // Still exactly one audit record
        assert_eq!(db.list_reassignments("e1").unwrap().len(), 1);
    }

    #[test]
    fn test_unowned_item_transfers() {
        let db = test_db();
        let item = seed_item(&db, "t1", None);

        let outcome =
            reassign_overdue(&db, "e1", &[item], "u2", 3, Utc::now()).unwrap();
        assert_eq!(outcome.count(), 1);

        let audit = db.list_reassignments("e1").unwrap();
        assert!(audit[0].previous_owner_id.is_none());
    }

    #[test]
    fn test_failed_batch_commits_nothing() {
        let db = test_db();
        let real = seed_item(&db, "t1", Some("u1"));

        // A phantom item (present in the batch, missing from the store)
        // makes the bulk update fail after t1 was already updated.
        let now = RiskDb::now_rfc3339();
        let phantom = DbWorkItem {
            id: "ghost".to_string(),
            entity_id: "e1".to_string(),
            title: "Ghost".to_string(),
            priority: "high".to_string(),
            status: "pending".to_string(),
            due_date: Some((Utc::now() - chrono::Duration::days(5)).to_rfc3339()),
            owner_id: Some("u1".to_string()),
            created_at: now.clone(),
            updated_at: now,
        };

        let err = reassign_overdue(&db, "e1", &[real, phantom], "u2", 3, Utc::now()).unwrap_err();
        assert!(matches!(err, MonitorError::Reassignment(_)));

        // Zero ownership changes, zero audit rows
        let stored = db.get_work_item("t1").unwrap().unwrap();
        assert_eq!(stored.owner_id.as_deref(), Some("u1"));
        assert!(db.list_reassignments("e1").unwrap().is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let db = test_db();
        let outcome = reassign_overdue(&db, "e1", &[], "u2", 3, Utc::now()).unwrap();
        assert_eq!(outcome.count(), 0);
        assert!(db.list_reassignments("e1").unwrap().is_empty());
    }
}

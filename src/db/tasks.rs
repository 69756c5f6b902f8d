use chrono::{DateTime, Utc};

use crate::grace::parse_due_date;

use super::*;

impl RiskDb {
    // =========================================================================
    // Work items
    // =========================================================================

    /// Insert or update a work item. Uses SQLite `ON CONFLICT` (upsert).
    pub fn upsert_work_item(&self, item: &DbWorkItem) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO work_items (
                id, entity_id, title, priority, status, due_date, owner_id,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                entity_id = excluded.entity_id,
                title = excluded.title,
                priority = excluded.priority,
                status = excluded.status,
                due_date = excluded.due_date,
                owner_id = excluded.owner_id,
                updated_at = excluded.updated_at",
            params![
                item.id,
                item.entity_id,
                item.title,
                item.priority,
                item.status,
                item.due_date,
                item.owner_id,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a single work item by its ID.
    pub fn get_work_item(&self, id: &str) -> Result<Option<DbWorkItem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, title, priority, status, due_date, owner_id,
                    created_at, updated_at
             FROM work_items WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], Self::map_work_item_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Query all non-completed work items for an entity.
    pub fn get_entity_work_items(&self, entity_id: &str) -> Result<Vec<DbWorkItem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, title, priority, status, due_date, owner_id,
                    created_at, updated_at
             FROM work_items
             WHERE entity_id = ?1
               AND status NOT IN ('completed', 'archived')
             ORDER BY due_date",
        )?;

        let rows = stmt.query_map(params![entity_id], Self::map_work_item_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Query overdue high-priority items for an entity: not completed, due
    /// date set and strictly before `now`.
    ///
    /// Items with a null, empty, or unparseable `due_date` are excluded,
    /// never an error. Read-only.
    pub fn find_overdue_high_priority(
        &self,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DbWorkItem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, title, priority, status, due_date, owner_id,
                    created_at, updated_at
             FROM work_items
             WHERE entity_id = ?1
               AND status NOT IN ('completed', 'archived')
               AND priority = 'high'
               AND due_date IS NOT NULL
               AND due_date != ''
             ORDER BY due_date",
        )?;

        let rows = stmt.query_map(params![entity_id], Self::map_work_item_row)?;

        let mut items = Vec::new();
        for row in rows {
            let item = row?;
            // Stored due dates may carry any UTC offset, so the overdue
            // comparison happens here, never as a SQL string comparison.
            match item.due_date.as_deref().and_then(parse_due_date) {
                Some(due) if due < now => items.push(item),
                _ => continue,
            }
        }
        Ok(items)
    }

    /// Transfer ownership of the given items to `new_owner_id`.
    ///
    /// Intended to run inside [`RiskDb::with_transaction`] so the ownership
    /// mutation and the matching audit rows commit together. Fails the whole
    /// batch if any id does not match a row.
    pub fn reassign_items(&self, item_ids: &[String], new_owner_id: &str) -> Result<(), DbError> {
        let now = Self::now_rfc3339();
        for id in item_ids {
            let changed = self.conn.execute(
                "UPDATE work_items SET owner_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_owner_id, now, id],
            )?;
            if changed == 0 {
                return Err(DbError::ItemNotFound(id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use chrono::Duration;

    pub(crate) fn seed_item(
        db: &RiskDb,
        id: &str,
        entity_id: &str,
        priority: &str,
        status: &str,
        due_date: Option<String>,
        owner_id: Option<&str>,
    ) {
        let now = RiskDb::now_rfc3339();
        db.upsert_work_item(&DbWorkItem {
            id: id.to_string(),
            entity_id: entity_id.to_string(),
            title: format!("Task {}", id),
            priority: priority.to_string(),
            status: status.to_string(),
            due_date,
            owner_id: owner_id.map(|s| s.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
        .expect("upsert work item");
    }

    fn days_ago(days: i64) -> Option<String> {
        Some((Utc::now() - Duration::days(days)).to_rfc3339())
    }

    #[test]
    fn test_overdue_scan_matches_past_due_high_priority() {
        let db = test_db();
        seed_item(&db, "t1", "e1", "high", "pending", days_ago(2), Some("u1"));

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "t1");
    }

    #[test]
    fn test_overdue_scan_excludes_completed_and_low_priority() {
        let db = test_db();
        seed_item(&db, "t1", "e1", "high", "completed", days_ago(2), None);
        seed_item(&db, "t2", "e1", "medium", "pending", days_ago(2), None);
        seed_item(&db, "t3", "e1", "high", "archived", days_ago(2), None);

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert!(overdue.is_empty());
    }

    #[test]
    fn test_overdue_scan_excludes_future_and_missing_due_dates() {
        let db = test_db();
        seed_item(&db, "t1", "e1", "high", "pending", days_ago(-2), None);
        seed_item(&db, "t2", "e1", "high", "pending", None, None);
        seed_item(&db, "t3", "e1", "high", "pending", Some(String::new()), None);

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert!(overdue.is_empty());
    }

    #[test]
    fn test_overdue_scan_excludes_unparseable_due_date() {
        let db = test_db();
        seed_item(
            &db,
            "t1",
            "e1",
            "high",
            "pending",
            Some("!garbage".to_string()),
            None,
        );

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert!(overdue.is_empty());
    }

    #[test]
    fn test_overdue_scan_matches_non_utc_offset() {
        let db = test_db();
        // Due 90 minutes ago, stored with a +02:00 offset. The offset form
        // sorts after the UTC rendering of `now`, so a string comparison
        // would miss it.
        let due = (Utc::now() - Duration::minutes(90))
            .with_timezone(&chrono::FixedOffset::east_opt(2 * 3600).unwrap())
            .to_rfc3339();
        seed_item(&db, "t1", "e1", "high", "pending", Some(due), Some("u1"));

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "t1");
    }

    #[test]
    fn test_overdue_scan_scoped_to_entity() {
        let db = test_db();
        seed_item(&db, "t1", "e1", "high", "pending", days_ago(2), None);
        seed_item(&db, "t2", "e2", "high", "pending", days_ago(2), None);

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].entity_id, "e1");
    }

    #[test]
    fn test_overdue_scan_accepts_date_only_due_dates() {
        let db = test_db();
        let due = (Utc::now() - Duration::days(3)).format("%Y-%m-%d").to_string();
        seed_item(&db, "t1", "e1", "high", "pending", Some(due), None);

        let overdue = db.find_overdue_high_priority("e1", Utc::now()).unwrap();
        assert_eq!(overdue.len(), 1);
    }

    #[test]
    fn test_entity_listing_excludes_closed_and_orders_by_due() {
        let db = test_db();
        seed_item(&db, "t_new", "e1", "high", "pending", days_ago(1), None);
        seed_item(&db, "t_old", "e1", "high", "pending", days_ago(5), None);
        seed_item(&db, "t_done", "e1", "high", "completed", days_ago(5), None);
        seed_item(&db, "t_gone", "e1", "low", "archived", days_ago(5), None);
        seed_item(&db, "t_other", "e2", "high", "pending", days_ago(5), None);

        let items = db.get_entity_work_items("e1").unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["t_old", "t_new"]);
    }

    #[test]
    fn test_reassign_items_updates_owner() {
        let db = test_db();
        seed_item(&db, "t1", "e1", "high", "pending", days_ago(2), Some("u1"));

        db.reassign_items(&["t1".to_string()], "u2").unwrap();

        let item = db.get_work_item("t1").unwrap().unwrap();
        assert_eq!(item.owner_id.as_deref(), Some("u2"));
    }

    #[test]
    fn test_reassign_items_fails_on_unknown_id() {
        let db = test_db();
        let err = db.reassign_items(&["missing".to_string()], "u2").unwrap_err();
        assert!(matches!(err, DbError::ItemNotFound(_)));
    }
}

use uuid::Uuid;

use super::*;

impl RiskDb {
    // =========================================================================
    // Reassignment audit trail (append-only)
    // =========================================================================

    /// Append one audit record for a completed ownership transfer.
    ///
    /// Intended to run inside [`RiskDb::with_transaction`] alongside the
    /// ownership mutation it describes. Returns the generated record id.
    pub fn append_reassignment(&self, record: &DbAuditRecord) -> Result<String, DbError> {
        let id = if record.id.is_empty() {
            format!("ra-{}", Uuid::new_v4())
        } else {
            record.id.clone()
        };

        self.conn.execute(
            "INSERT INTO reassignment_audit (
                id, entity_id, item_id, item_title, item_priority,
                previous_owner_id, new_owner_id, reason, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                record.entity_id,
                record.item_id,
                record.item_title,
                record.item_priority,
                record.previous_owner_id,
                record.new_owner_id,
                record.reason,
                record.created_at,
            ],
        )?;
        Ok(id)
    }

    /// List the audit trail for an entity, most recent first.
    pub fn list_reassignments(&self, entity_id: &str) -> Result<Vec<DbAuditRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, item_id, item_title, item_priority,
                    previous_owner_id, new_owner_id, reason, created_at
             FROM reassignment_audit
             WHERE entity_id = ?1
             ORDER BY created_at DESC, id",
        )?;

        let rows = stmt.query_map(params![entity_id], |row| {
            Ok(DbAuditRecord {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                item_id: row.get(2)?,
                item_title: row.get(3)?,
                item_priority: row.get(4)?,
                previous_owner_id: row.get(5)?,
                new_owner_id: row.get(6)?,
                reason: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

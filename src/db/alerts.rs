use rusqlite::params_from_iter;
use uuid::Uuid;

use super::*;

impl RiskDb {
    // =========================================================================
    // Alerts
    // =========================================================================

    /// Persist one alert. Returns the generated alert id.
    pub fn create_alert(&self, alert: &DbAlert) -> Result<String, DbError> {
        let id = if alert.id.is_empty() {
            format!("al-{}", Uuid::new_v4())
        } else {
            alert.id.clone()
        };

        self.conn.execute(
            "INSERT INTO alerts (
                id, recipient_id, entity_id, title, message, severity, link,
                created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                alert.recipient_id,
                alert.entity_id,
                alert.title,
                alert.message,
                alert.severity.as_str(),
                alert.link,
                alert.created_at,
            ],
        )?;
        Ok(id)
    }

    /// List alerts for a recipient, most recent first.
    pub fn get_alerts_for(&self, recipient_id: &str) -> Result<Vec<DbAlert>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recipient_id, entity_id, title, message, severity, link,
                    created_at
             FROM alerts
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, id",
        )?;

        let rows = stmt.query_map(params![recipient_id], |row| {
            let severity: String = row.get(5)?;
            Ok(DbAlert {
                id: row.get(0)?,
                recipient_id: row.get(1)?,
                entity_id: row.get(2)?,
                title: row.get(3)?,
                message: row.get(4)?,
                severity: AlertSeverity::from_str_lossy(&severity),
                link: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    // =========================================================================
    // Per-item alert suppression state (renotifyUnresolved = false)
    // =========================================================================

    /// Check whether an item already has an unresolved risk alert on record.
    pub fn was_item_alerted(&self, entity_id: &str, item_id: &str) -> Result<bool, DbError> {
        let exists = self
            .conn
            .prepare(
                "SELECT 1 FROM risk_alert_state
                 WHERE entity_id = ?1 AND item_id = ?2",
            )?
            .exists(params![entity_id, item_id])?;
        Ok(exists)
    }

    /// Record that an item was covered by a risk alert.
    pub fn mark_item_alerted(&self, entity_id: &str, item_id: &str) -> Result<(), DbError> {
        let now = Self::now_rfc3339();
        self.conn.execute(
            "INSERT INTO risk_alert_state (entity_id, item_id, last_alerted_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_id, item_id) DO UPDATE SET
                last_alerted_at = excluded.last_alerted_at",
            params![entity_id, item_id, now],
        )?;
        Ok(())
    }

    /// Drop alert state for items no longer in the entity's overdue set, so a
    /// relapsed item alerts again. Pass an empty slice to clear everything.
    pub fn clear_alert_state_except(
        &self,
        entity_id: &str,
        keep_item_ids: &[String],
    ) -> Result<usize, DbError> {
        if keep_item_ids.is_empty() {
            let cleared = self.conn.execute(
                "DELETE FROM risk_alert_state WHERE entity_id = ?1",
                params![entity_id],
            )?;
            return Ok(cleared);
        }

        let placeholders = (0..keep_item_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM risk_alert_state
             WHERE entity_id = ?1 AND item_id NOT IN ({})",
            placeholders
        );

        let mut values: Vec<String> = Vec::with_capacity(keep_item_ids.len() + 1);
        values.push(entity_id.to_string());
        values.extend(keep_item_ids.iter().cloned());

        let cleared = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(cleared)
    }
}

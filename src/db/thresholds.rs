use super::*;

/// Partial update for an entity's risk policy. `None` fields are left
/// untouched; `backup_assignee_id` is double-optional so the backup owner
/// can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct ThresholdPatch {
    pub budget_warning_percent: Option<i64>,
    pub budget_critical_percent: Option<i64>,
    pub task_risk_check_enabled: Option<bool>,
    pub auto_reassign_enabled: Option<bool>,
    pub reassign_after_days: Option<i64>,
    pub backup_assignee_id: Option<Option<String>>,
}

impl ThresholdPatch {
    fn apply(&self, mut current: DbThresholds) -> DbThresholds {
        if let Some(v) = self.budget_warning_percent {
            current.budget_warning_percent = v;
        }
        if let Some(v) = self.budget_critical_percent {
            current.budget_critical_percent = v;
        }
        if let Some(v) = self.task_risk_check_enabled {
            current.task_risk_check_enabled = v;
        }
        if let Some(v) = self.auto_reassign_enabled {
            current.auto_reassign_enabled = v;
        }
        if let Some(v) = self.reassign_after_days {
            current.reassign_after_days = v;
        }
        if let Some(ref v) = self.backup_assignee_id {
            current.backup_assignee_id = v.clone();
        }
        current
    }
}

/// Cross-field policy validation, applied at the update boundary only.
/// Reads never validate — a stored-but-odd row still evaluates.
fn validate_thresholds(t: &DbThresholds) -> Result<(), DbError> {
    if !(50..=100).contains(&t.budget_warning_percent) {
        return Err(DbError::InvalidThresholds(format!(
            "budget_warning_percent must be in [50, 100], got {}",
            t.budget_warning_percent
        )));
    }
    if !(50..=100).contains(&t.budget_critical_percent) {
        return Err(DbError::InvalidThresholds(format!(
            "budget_critical_percent must be in [50, 100], got {}",
            t.budget_critical_percent
        )));
    }
    if t.budget_warning_percent > t.budget_critical_percent {
        return Err(DbError::InvalidThresholds(format!(
            "budget_warning_percent ({}) exceeds budget_critical_percent ({})",
            t.budget_warning_percent, t.budget_critical_percent
        )));
    }
    if t.reassign_after_days < 0 {
        return Err(DbError::InvalidThresholds(format!(
            "reassign_after_days must be >= 0, got {}",
            t.reassign_after_days
        )));
    }
    Ok(())
}

impl RiskDb {
    // =========================================================================
    // Entity thresholds (risk policy)
    // =========================================================================

    /// Fetch the stored policy row for an entity, if one exists.
    pub fn try_get_thresholds(&self, entity_id: &str) -> Result<Option<DbThresholds>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, budget_warning_percent, budget_critical_percent,
                    task_risk_check_enabled, auto_reassign_enabled,
                    reassign_after_days, backup_assignee_id, updated_at
             FROM entity_thresholds WHERE entity_id = ?1",
        )?;

        let mut rows = stmt.query_map(params![entity_id], |row| {
            Ok(DbThresholds {
                entity_id: row.get(0)?,
                budget_warning_percent: row.get(1)?,
                budget_critical_percent: row.get(2)?,
                task_risk_check_enabled: row.get(3)?,
                auto_reassign_enabled: row.get(4)?,
                reassign_after_days: row.get(5)?,
                backup_assignee_id: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Fetch an entity's policy, substituting system defaults when no row
    /// exists or the lookup fails. Never fails: "couldn't read policy" and
    /// "not configured" are the same thing to the monitor.
    pub fn get_thresholds(&self, entity_id: &str) -> DbThresholds {
        match self.try_get_thresholds(entity_id) {
            Ok(Some(t)) => t,
            Ok(None) => DbThresholds::defaults(entity_id),
            Err(e) => {
                log::warn!(
                    "Threshold lookup failed for entity {}: {}. Substituting defaults.",
                    entity_id,
                    e
                );
                DbThresholds::defaults(entity_id)
            }
        }
    }

    /// Apply a partial policy update, stamping `updated_at`.
    ///
    /// The patch is merged over the stored row (or the defaults when the
    /// entity was never configured), validated as a whole, then written as
    /// one upsert. Returns the merged row as stored.
    pub fn update_thresholds(
        &self,
        entity_id: &str,
        patch: &ThresholdPatch,
    ) -> Result<DbThresholds, DbError> {
        let current = self
            .try_get_thresholds(entity_id)?
            .unwrap_or_else(|| DbThresholds::defaults(entity_id));

        let mut merged = patch.apply(current);
        validate_thresholds(&merged)?;
        merged.updated_at = Self::now_rfc3339();

        self.conn.execute(
            "INSERT INTO entity_thresholds (
                entity_id, budget_warning_percent, budget_critical_percent,
                task_risk_check_enabled, auto_reassign_enabled,
                reassign_after_days, backup_assignee_id, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(entity_id) DO UPDATE SET
                budget_warning_percent = excluded.budget_warning_percent,
                budget_critical_percent = excluded.budget_critical_percent,
                task_risk_check_enabled = excluded.task_risk_check_enabled,
                auto_reassign_enabled = excluded.auto_reassign_enabled,
                reassign_after_days = excluded.reassign_after_days,
                backup_assignee_id = excluded.backup_assignee_id,
                updated_at = excluded.updated_at",
            params![
                merged.entity_id,
                merged.budget_warning_percent,
                merged.budget_critical_percent,
                merged.task_risk_check_enabled,
                merged.auto_reassign_enabled,
                merged.reassign_after_days,
                merged.backup_assignee_id,
                merged.updated_at,
            ],
        )?;

        Ok(merged)
    }
}

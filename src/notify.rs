//! Alert emission for the risk pipeline.
//!
//! Fire-and-forget from the monitor's perspective: a failed alert write is
//! logged for the operator and never aborts the pass that produced it.

use crate::db::{AlertSeverity, DbAlert, RiskDb};
use crate::error::MonitorError;

/// Link target for an entity's task view, embedded in alerts.
fn task_view_link(entity_id: &str) -> String {
    format!("/entities/{}/tasks", entity_id)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Emit the risk-detected alert: N overdue high-priority items found.
pub fn notify_risk_detected(db: &RiskDb, recipient_id: &str, entity_id: &str, overdue_count: usize) {
    let alert = DbAlert {
        id: String::new(),
        recipient_id: recipient_id.to_string(),
        entity_id: Some(entity_id.to_string()),
        title: "Task risk detected".to_string(),
        message: format!(
            "{} overdue high-priority task{} need attention",
            overdue_count,
            plural(overdue_count)
        ),
        severity: AlertSeverity::Error,
        link: Some(task_view_link(entity_id)),
        created_at: RiskDb::now_rfc3339(),
    };

    if let Err(e) = db.create_alert(&alert) {
        log::warn!("{}", MonitorError::Notification(e));
    }
}

/// Emit the reassignment-executed alert. Only call with `reassigned_count > 0`.
pub fn notify_reassignment_executed(
    db: &RiskDb,
    recipient_id: &str,
    entity_id: &str,
    reassigned_count: usize,
) {
    let alert = DbAlert {
        id: String::new(),
        recipient_id: recipient_id.to_string(),
        entity_id: Some(entity_id.to_string()),
        title: "Overdue tasks reassigned".to_string(),
        message: format!(
            "{} overdue task{} automatically reassigned to the backup owner",
            reassigned_count,
            plural(reassigned_count)
        ),
        severity: AlertSeverity::Success,
        link: Some(task_view_link(entity_id)),
        created_at: RiskDb::now_rfc3339(),
    };

    if let Err(e) = db.create_alert(&alert) {
        log::warn!("{}", MonitorError::Notification(e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_risk_alert_shape() {
        let db = test_db();
        notify_risk_detected(&db, "u1", "e1", 3);

        let alerts = db.get_alerts_for("u1").unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Error);
        assert_eq!(alerts[0].link.as_deref(), Some("/entities/e1/tasks"));
        assert!(alerts[0].message.contains("3 overdue high-priority tasks"));
    }

    #[test]
    fn test_reassignment_alert_shape() {
        let db = test_db();
        notify_reassignment_executed(&db, "u1", "e1", 1);

        let alerts = db.get_alerts_for("u1").unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Success);
        assert!(alerts[0].message.contains("1 overdue task automatically"));
    }
}

//! The risk monitor loop.
//!
//! Consumes tenant-context triggers (login, active-entity switch) from an
//! mpsc channel, debounces them, and runs one evaluation pass per surviving
//! trigger: load policy → scan overdue items → evaluate grace period →
//! reassign → notify. A trigger arriving inside the debounce window
//! supersedes the pending pass rather than queueing behind it, so rapid
//! tenant switching produces one pass, not a backlog.
//!
//! Each pass opens its own database connection on the blocking pool under a
//! timeout, so the loop never holds a connection across awaits and an
//! abandoned pass is simply retried on the next trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::db::{DbThresholds, RiskDb};
use crate::error::MonitorError;
use crate::grace::{has_exceeded_grace, parse_due_date};
use crate::identity::{can_trigger_risk_monitor, IdentityContext};
use crate::notify;
use crate::reassign::{reassign_overdue, ReassignmentOutcome};
use crate::types::RiskwatchConfig;

/// Channel buffer size for monitor triggers.
pub const TRIGGER_CHANNEL_SIZE: usize = 32;

/// A tenant-context change that may schedule a pass.
pub type MonitorTrigger = IdentityContext;

/// Summary of one completed evaluation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub entity_id: String,
    pub ran_at: String,
    pub policy_enabled: bool,
    pub overdue: usize,
    pub eligible: usize,
    pub reassigned: Vec<String>,
    pub skipped_already_backup: usize,
    pub risk_alerted: bool,
}

/// Create the trigger channel the monitor consumes.
pub fn trigger_channel() -> (mpsc::Sender<MonitorTrigger>, mpsc::Receiver<MonitorTrigger>) {
    mpsc::channel(TRIGGER_CHANNEL_SIZE)
}

/// Cooperative cancellation for an in-flight pass.
///
/// `tokio::time::timeout` can only abandon the blocking task, not stop it,
/// so the pass re-checks this flag before every mutating stage and bails
/// with [`MonitorError::Cancelled`] once it is set.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn ensure_active(&self) -> Result<(), MonitorError> {
        if self.is_cancelled() {
            Err(MonitorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The long-lived monitor: owns the trigger receiver and the last-pass
/// report.
pub struct RiskMonitor {
    config: RiskwatchConfig,
    rx: mpsc::Receiver<MonitorTrigger>,
    debounce: Duration,
    last_report: Arc<Mutex<Option<PassReport>>>,
}

impl RiskMonitor {
    pub fn new(config: RiskwatchConfig, rx: mpsc::Receiver<MonitorTrigger>) -> Self {
        let debounce = Duration::from_secs(config.debounce_secs);
        Self {
            config,
            rx,
            debounce,
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared handle to the most recent pass report.
    pub fn last_report_handle(&self) -> Arc<Mutex<Option<PassReport>>> {
        Arc::clone(&self.last_report)
    }

    /// Run until the trigger channel closes.
    pub async fn run(mut self) {
        log::info!(
            "RiskMonitor: loop started (debounce {}s, pass timeout {}s)",
            self.config.debounce_secs,
            self.config.pass_timeout_secs
        );

        while let Some(trigger) = self.rx.recv().await {
            let trigger = self.debounce_trigger(trigger).await;

            if !can_trigger_risk_monitor(trigger.role) {
                log::debug!(
                    "RiskMonitor: role '{}' excluded from monitoring, ignoring trigger for {}",
                    trigger.role.as_str(),
                    trigger.entity_id
                );
                continue;
            }

            self.execute_pass(trigger).await;
        }

        log::info!("RiskMonitor: trigger channel closed, loop stopped");
    }

    /// Wait out the debounce window, replacing the pending trigger whenever
    /// a newer one arrives. The discarded trigger's pass never runs.
    async fn debounce_trigger(&mut self, mut pending: MonitorTrigger) -> MonitorTrigger {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.debounce) => return pending,
                next = self.rx.recv() => match next {
                    Some(trigger) => {
                        log::debug!(
                            "RiskMonitor: pending pass for {} superseded by {}",
                            pending.entity_id,
                            trigger.entity_id
                        );
                        pending = trigger;
                    }
                    // Channel closed mid-debounce: still run the pending pass.
                    None => return pending,
                }
            }
        }
    }

    async fn execute_pass(&self, trigger: MonitorTrigger) {
        let db_path = self.config.db_path.clone();
        let renotify = self.config.renotify_unresolved;
        let timeout = Duration::from_secs(self.config.pass_timeout_secs);
        let entity_id = trigger.entity_id.clone();

        let cancel = CancelFlag::default();
        let pass_cancel = cancel.clone();
        let pass = tokio::task::spawn_blocking(move || -> Result<PassReport, MonitorError> {
            let db = match db_path {
                Some(path) => RiskDb::open_at(path),
                None => RiskDb::open(),
            }?;
            run_risk_pass(&db, &trigger, Utc::now(), renotify, &pass_cancel)
        });

        match tokio::time::timeout(timeout, pass).await {
            Ok(Ok(Ok(report))) => {
                log::info!(
                    "RiskMonitor: pass for {} — {} overdue, {} past grace, {} reassigned",
                    entity_id,
                    report.overdue,
                    report.eligible,
                    report.reassigned.len()
                );
                *self.last_report.lock() = Some(report);
            }
            Ok(Ok(Err(e))) => {
                if e.aborts_pass() {
                    log::warn!("RiskMonitor: pass for {} aborted: {}", entity_id, e);
                } else {
                    log::info!("RiskMonitor: pass for {} degraded: {}", entity_id, e);
                }
            }
            Ok(Err(join_err)) => {
                log::error!("RiskMonitor: pass task for {} panicked: {}", entity_id, join_err);
            }
            Err(_elapsed) => {
                // The blocking task keeps the flag and stops itself before
                // its next mutating stage.
                cancel.cancel();
                log::warn!(
                    "RiskMonitor: {} (entity {})",
                    MonitorError::Timeout(self.config.pass_timeout_secs),
                    entity_id
                );
            }
        }
    }
}

/// Run one evaluation pass for a tenant. Stages run strictly in order:
/// policy → scan → grace evaluation → reassignment → notification.
///
/// Policy-lookup failures degrade to defaults; a scan failure aborts the
/// pass with no alert; a reassignment failure still emits the risk-detected
/// alert (the data was confirmed) but never the success alert. A cancelled
/// pass stops before its next mutating stage and writes nothing further.
pub fn run_risk_pass(
    db: &RiskDb,
    ctx: &IdentityContext,
    now: DateTime<Utc>,
    renotify_unresolved: bool,
    cancel: &CancelFlag,
) -> Result<PassReport, MonitorError> {
    let entity_id = &ctx.entity_id;
    let mut report = PassReport {
        entity_id: entity_id.clone(),
        ran_at: now.to_rfc3339(),
        ..Default::default()
    };

    // Policy: absent or unreadable rows become system defaults.
    let policy = match db.try_get_thresholds(entity_id) {
        Ok(Some(t)) => t,
        Ok(None) => DbThresholds::defaults(entity_id),
        Err(e) => {
            log::warn!("RiskMonitor: {}", MonitorError::ConfigUnavailable(e));
            DbThresholds::defaults(entity_id)
        }
    };
    report.policy_enabled = policy.task_risk_check_enabled;

    if !policy.task_risk_check_enabled {
        log::debug!("RiskMonitor: risk checks disabled for entity {}", entity_id);
        return Ok(report);
    }

    // Scanning
    let overdue = db
        .find_overdue_high_priority(entity_id, now)
        .map_err(MonitorError::Scan)?;
    report.overdue = overdue.len();

    // Items that dropped out of the overdue set may alert again later.
    cancel.ensure_active()?;
    let overdue_ids: Vec<String> = overdue.iter().map(|i| i.id.clone()).collect();
    if let Err(e) = db.clear_alert_state_except(entity_id, &overdue_ids) {
        log::warn!("RiskMonitor: failed to clear alert state for {}: {}", entity_id, e);
    }

    if overdue.is_empty() {
        return Ok(report);
    }

    // Evaluating
    let eligible: Vec<_> = overdue
        .iter()
        .filter(|item| {
            item.due_date
                .as_deref()
                .and_then(parse_due_date)
                .map(|due| has_exceeded_grace(due, now, policy.reassign_after_days))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    report.eligible = eligible.len();

    // Reassigning, gated on the policy toggle and a configured backup owner.
    // A failure here is reported after the risk alert below.
    cancel.ensure_active()?;
    let reassign_result: Result<ReassignmentOutcome, MonitorError> = if !policy.auto_reassign_enabled
    {
        Ok(ReassignmentOutcome::default())
    } else {
        match policy.backup_assignee_id.as_deref() {
            Some(backup) => reassign_overdue(
                db,
                entity_id,
                &eligible,
                backup,
                policy.reassign_after_days,
                now,
            ),
            None => {
                log::debug!(
                    "RiskMonitor: auto-reassign enabled for {} but no backup owner configured",
                    entity_id
                );
                Ok(ReassignmentOutcome::default())
            }
        }
    };

    // Notifying: risk alert first. With renotify off, only alert when at
    // least one overdue item hasn't been alerted yet this occurrence.
    cancel.ensure_active()?;
    let should_alert = renotify_unresolved
        || overdue
            .iter()
            .any(|item| !db.was_item_alerted(entity_id, &item.id).unwrap_or(false));

    if should_alert {
        notify::notify_risk_detected(db, &ctx.user_id, entity_id, overdue.len());
        report.risk_alerted = true;
    }
    for item in &overdue {
        if let Err(e) = db.mark_item_alerted(entity_id, &item.id) {
            log::warn!("RiskMonitor: failed to record alert state for {}: {}", item.id, e);
        }
    }

    let outcome = reassign_result?;

    if outcome.count() > 0 {
        notify::notify_reassignment_executed(db, &ctx.user_id, entity_id, outcome.count());
    }
    report.reassigned = outcome.reassigned;
    report.skipped_already_backup = outcome.skipped_already_backup;

    Ok(report)
}

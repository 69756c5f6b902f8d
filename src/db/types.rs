//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Invalid threshold configuration: {0}")]
    InvalidThresholds(String),

    #[error("Work item not found: {0}")]
    ItemNotFound(String),
}

/// A row from the `entity_thresholds` table: per-tenant risk policy.
///
/// One row per entity, created lazily. Absent rows are represented by
/// [`DbThresholds::defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbThresholds {
    pub entity_id: String,
    pub budget_warning_percent: i64,
    pub budget_critical_percent: i64,
    pub task_risk_check_enabled: bool,
    pub auto_reassign_enabled: bool,
    pub reassign_after_days: i64,
    pub backup_assignee_id: Option<String>,
    pub updated_at: String,
}

impl DbThresholds {
    /// System defaults used when an entity has never saved its policy:
    /// 80% warning, 95% critical, risk check on, auto-reassign off,
    /// 3-day grace period, no backup owner.
    pub fn defaults(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            budget_warning_percent: 80,
            budget_critical_percent: 95,
            task_risk_check_enabled: true,
            auto_reassign_enabled: false,
            reassign_after_days: 3,
            backup_assignee_id: None,
            updated_at: String::new(),
        }
    }
}

/// A row from the `work_items` table (the subset of task fields the risk
/// engine consumes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbWorkItem {
    pub id: String,
    pub entity_id: String,
    pub title: String,
    pub priority: String,
    pub status: String,
    pub due_date: Option<String>,
    pub owner_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the append-only `reassignment_audit` table.
///
/// Created exactly once per successful ownership transfer; never mutated
/// or deleted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditRecord {
    pub id: String,
    pub entity_id: String,
    pub item_id: String,
    pub item_title: String,
    pub item_priority: String,
    pub previous_owner_id: Option<String>,
    pub new_owner_id: String,
    pub reason: String,
    pub created_at: String,
}

/// A row from the `alerts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAlert {
    pub id: String,
    pub recipient_id: String,
    pub entity_id: Option<String>,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub link: Option<String>,
    pub created_at: String,
}

/// Alert severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Error,
    Success,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Error => "error",
            AlertSeverity::Success => "success",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "error" => AlertSeverity::Error,
            "success" => AlertSeverity::Success,
            _ => AlertSeverity::Info,
        }
    }
}

//! Daemon configuration, loaded from `~/.riskwatch/config.json`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::identity::Role;

/// Top-level configuration for the riskwatch daemon. Every field has a
/// default so a missing or partial config file still produces a working
/// monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskwatchConfig {
    /// Override for the database path; defaults to `~/.riskwatch/riskwatch.db`.
    pub db_path: Option<PathBuf>,

    /// Debounce delay between a trigger and the pass it schedules, in
    /// seconds. A trigger arriving inside this window supersedes the
    /// pending pass.
    pub debounce_secs: u64,

    /// Time budget for one pass, in seconds. A pass exceeding it is
    /// abandoned and retried only on the next trigger.
    pub pass_timeout_secs: u64,

    /// When true (the default), every pass re-alerts on unresolved risk.
    /// When false, an item only produces a risk alert once per overdue
    /// occurrence.
    pub renotify_unresolved: bool,

    /// Entities the daemon re-evaluates on its own clock, independent of
    /// incoming triggers.
    pub watched: Vec<WatchedEntity>,

    /// Interval for re-evaluating watched entities, in seconds. `None`
    /// disables the periodic feed (the daemon then only reacts to
    /// triggers).
    pub retrigger_interval_secs: Option<u64>,
}

impl Default for RiskwatchConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            debounce_secs: 5,
            pass_timeout_secs: 30,
            renotify_unresolved: true,
            watched: Vec::new(),
            retrigger_interval_secs: Some(4 * 60 * 60),
        }
    }
}

/// One entity the daemon monitors on its periodic clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedEntity {
    pub entity_id: String,
    /// Who receives the alerts for this entity.
    pub recipient_id: String,
    #[serde(default = "default_watch_role")]
    pub role: Role,
}

fn default_watch_role() -> Role {
    Role::Operator
}

/// Load configuration from `~/.riskwatch/config.json`, falling back to
/// defaults when the file is missing or unreadable.
pub fn load_config() -> RiskwatchConfig {
    let Some(home) = dirs::home_dir() else {
        log::warn!("Home directory not found, using default configuration");
        return RiskwatchConfig::default();
    };

    let path = home.join(".riskwatch").join("config.json");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return RiskwatchConfig::default(),
    };

    match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            log::warn!(
                "Failed to parse {}: {}. Using default configuration.",
                path.display(),
                e
            );
            RiskwatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RiskwatchConfig::default();
        assert_eq!(config.debounce_secs, 5);
        assert_eq!(config.pass_timeout_secs, 30);
        assert!(config.renotify_unresolved);
        assert!(config.watched.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: RiskwatchConfig =
            serde_json::from_str(r#"{"renotifyUnresolved": false}"#).unwrap();
        assert!(!config.renotify_unresolved);
        assert_eq!(config.debounce_secs, 5);
    }

    #[test]
    fn test_watched_entity_role_defaults_to_operator() {
        let config: RiskwatchConfig = serde_json::from_str(
            r#"{"watched": [{"entityId": "e1", "recipientId": "u1"}]}"#,
        )
        .unwrap();
        assert_eq!(config.watched.len(), 1);
        assert_eq!(config.watched[0].role, Role::Operator);
    }
}

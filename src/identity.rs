//! Identity context the monitor observes to decide whether and for which
//! tenant to run.
//!
//! Role exclusion is an explicit capability check here rather than a
//! conditional buried in the trigger sources.

use serde::{Deserialize, Serialize};

/// Workspace roles, as carried by trigger events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Manager,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "operator" => Role::Operator,
            "manager" => Role::Manager,
            _ => Role::Member,
        }
    }
}

/// Read-only session context attached to a trigger: who switched into which
/// tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub entity_id: String,
    pub user_id: String,
    pub role: Role,
}

/// Whether a role's context changes may trigger a monitoring pass.
/// Managers are excluded by policy.
pub fn can_trigger_risk_monitor(role: Role) -> bool {
    !matches!(role, Role::Manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_excluded() {
        assert!(!can_trigger_risk_monitor(Role::Manager));
        assert!(can_trigger_risk_monitor(Role::Admin));
        assert!(can_trigger_risk_monitor(Role::Operator));
        assert!(can_trigger_risk_monitor(Role::Member));
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Admin, Role::Operator, Role::Manager, Role::Member] {
            assert_eq!(Role::from_str_lossy(role.as_str()), role);
        }
        // Unknown strings degrade to the least-privileged role
        assert_eq!(Role::from_str_lossy("owner"), Role::Member);
    }
}

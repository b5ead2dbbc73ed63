//! Import/export of engine state as a single opaque blob.
//!
//! A snapshot captures the role graph, ability rules, field permissions and
//! policies — not the decision cache, audit log, event handlers or
//! performance history, which are runtime artifacts rather than
//! configuration. Import is a full replace: the importing engine's prior
//! RBAC/ABAC/policy state is discarded, not merged.

use crate::abac::{AbacEngine, AbilityRule, FieldPermission};
use crate::errors::{AuthzError, AuthzResult};
use crate::policy::{ConflictResolution, Policy, PolicyEngine};
use crate::rbac::{RbacEngine, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub rbac: RbacSnapshot,
    pub abac: AbacSnapshot,
    pub policy: PolicySnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacSnapshot {
    pub max_depth: usize,
    pub roles: Vec<Role>,
    pub user_roles: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbacSnapshot {
    pub strict: bool,
    pub rules: Vec<AbilityRule>,
    /// `(subject_type, action, permission)` triples — a tuple key can't
    /// round-trip through JSON object keys, so the map is flattened.
    pub field_permissions: Vec<(String, String, FieldPermission)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub default_resolution: ConflictResolution,
    pub evaluation_budget: usize,
    pub policies: Vec<Policy>,
}

pub fn export(rbac: &RbacEngine, abac: &AbacEngine, policy: &PolicyEngine) -> EngineSnapshot {
    EngineSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: Utc::now(),
        rbac: RbacSnapshot {
            max_depth: rbac.max_depth(),
            roles: rbac.list_roles().into_iter().cloned().collect(),
            user_roles: rbac.user_role_assignments().clone(),
        },
        abac: AbacSnapshot {
            strict: abac.strict,
            rules: abac.rules().to_vec(),
            field_permissions: abac
                .field_permissions()
                .iter()
                .map(|((subject_type, action), perm)| (subject_type.clone(), action.clone(), perm.clone()))
                .collect(),
        },
        policy: PolicySnapshot {
            default_resolution: policy.default_resolution(),
            evaluation_budget: policy.evaluation_budget(),
            policies: policy.list_policies().to_vec(),
        },
    }
}

/// Rebuilds engines from a previously exported snapshot. Rejects a snapshot
/// from a newer format than this build understands.
pub fn import(snapshot: EngineSnapshot) -> AuthzResult<(RbacEngine, AbacEngine, PolicyEngine)> {
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(AuthzError::InvalidConfig(format!(
            "snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
            snapshot.version
        )));
    }

    let rbac = RbacEngine::restore(snapshot.rbac.max_depth, snapshot.rbac.roles, snapshot.rbac.user_roles);

    let field_permissions = snapshot
        .abac
        .field_permissions
        .into_iter()
        .map(|(subject_type, action, perm)| ((subject_type, action), perm))
        .collect();
    let abac = AbacEngine::restore(snapshot.abac.strict, snapshot.abac.rules, field_permissions);

    let policy = PolicyEngine::restore(
        snapshot.policy.default_resolution,
        snapshot.policy.evaluation_budget,
        snapshot.policy.policies,
    );

    Ok((rbac, abac, policy))
}

pub fn to_json(snapshot: &EngineSnapshot) -> AuthzResult<String> {
    serde_json::to_string(snapshot).map_err(AuthzError::from)
}

pub fn from_json(json: &str) -> AuthzResult<EngineSnapshot> {
    serde_json::from_str(json).map_err(AuthzError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::RoleOptions;

    #[test]
    fn round_trips_rbac_abac_and_policy_state() {
        let mut rbac = RbacEngine::new(10);
        rbac.create_role("admin", RoleOptions::default()).unwrap();
        rbac.grant("admin", "users", "*", false).unwrap();
        rbac.assign_role("alice", "admin").unwrap();

        let mut abac = AbacEngine::new(true);
        abac.add_rule(vec!["update".into()], vec!["Post".into()], Default::default());

        let mut policy = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        policy.add_policy(Policy {
            id: String::new(),
            name: "base".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![],
        });

        let snapshot = export(&rbac, &abac, &policy);
        let json = to_json(&snapshot).unwrap();
        let restored_snapshot = from_json(&json).unwrap();
        let (mut restored_rbac, restored_abac, restored_policy) = import(restored_snapshot).unwrap();

        assert!(restored_rbac.check("alice", "users", "delete").allowed);
        assert_eq!(restored_abac.rules().len(), 1);
        assert_eq!(restored_policy.list_policies().len(), 1);
    }

    #[test]
    fn import_replaces_rather_than_merges() {
        let rbac = RbacEngine::new(10);
        let abac = AbacEngine::new(true);
        let policy = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        let snapshot = export(&rbac, &abac, &policy);

        let mut existing = RbacEngine::new(10);
        existing.create_role("leftover", RoleOptions::default()).unwrap();

        let (restored, _, _) = import(snapshot).unwrap();
        assert!(restored.get_role("leftover").is_none());
        assert!(existing.get_role("leftover").is_some());
    }

    #[test]
    fn rejects_snapshot_from_a_newer_version() {
        let rbac = RbacEngine::new(10);
        let abac = AbacEngine::new(true);
        let policy = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        let mut snapshot = export(&rbac, &abac, &policy);
        snapshot.version = SNAPSHOT_VERSION + 1;

        assert!(import(snapshot).is_err());
    }
}

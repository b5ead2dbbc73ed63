//! Temporary-permission and temporary-role overlay.
//!
//! Consulted during `check()` before RBAC. A one-time entry's match is
//! consumed atomically with the decision: a decision derived from a
//! one-time match is never cached (the engine pipeline, not this module,
//! enforces that by skipping the cache write).

use crate::decision::{Decision, DecisionSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TemporaryGrantOptions {
    pub created_by: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryPermission {
    pub id: String,
    pub user: String,
    pub resource: String,
    pub action: String,
    pub expires_at: DateTime<Utc>,
    pub one_time: bool,
    pub used_count: u32,
    pub created_by: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TemporaryPermission {
    fn matches(&self, resource: &str, action: &str) -> bool {
        (self.resource == "*" || self.resource == resource)
            && (self.action == "*" || self.action == action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryRoleGrant {
    pub id: String,
    pub user: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

const DEFAULT_ONE_TIME_EXPIRY_SECS: i64 = 24 * 60 * 60;
const DEFAULT_NOTIFY_BEFORE_SECS: i64 = 300;

pub struct TemporaryOverlay {
    permissions: HashMap<String, TemporaryPermission>,
    role_grants: HashMap<String, TemporaryRoleGrant>,
    notify_before: chrono::Duration,
}

/// Outcome of a successful match against the overlay, including whether the
/// match consumed a one-time entry — callers (the decision pipeline) use
/// this to decide whether the resulting decision may be cached.
pub struct OverlayMatch {
    pub decision: Decision,
    pub consumed_one_time: bool,
}

impl TemporaryOverlay {
    pub fn new() -> Self {
        Self {
            permissions: HashMap::new(),
            role_grants: HashMap::new(),
            notify_before: chrono::Duration::seconds(DEFAULT_NOTIFY_BEFORE_SECS),
        }
    }

    pub fn with_notify_before(mut self, duration: chrono::Duration) -> Self {
        self.notify_before = duration;
        self
    }

    pub fn grant_temp(
        &mut self,
        user: &str,
        resource: &str,
        action: &str,
        expires_at: DateTime<Utc>,
        options: TemporaryGrantOptions,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.permissions.insert(
            id.clone(),
            TemporaryPermission {
                id: id.clone(),
                user: user.to_string(),
                resource: resource.to_string(),
                action: action.to_string(),
                expires_at,
                one_time: false,
                used_count: 0,
                created_by: options.created_by,
                metadata: options.metadata,
            },
        );
        id
    }

    pub fn grant_once(
        &mut self,
        user: &str,
        resource: &str,
        action: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> String {
        let expires_at =
            expires_at.unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(DEFAULT_ONE_TIME_EXPIRY_SECS));
        let id = Uuid::new_v4().to_string();
        self.permissions.insert(
            id.clone(),
            TemporaryPermission {
                id: id.clone(),
                user: user.to_string(),
                resource: resource.to_string(),
                action: action.to_string(),
                expires_at,
                one_time: true,
                used_count: 0,
                created_by: None,
                metadata: HashMap::new(),
            },
        );
        id
    }

    pub fn grant_temp_role(
        &mut self,
        user: &str,
        role: &str,
        expires_at: DateTime<Utc>,
        created_by: Option<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.role_grants.insert(
            id.clone(),
            TemporaryRoleGrant {
                id: id.clone(),
                user: user.to_string(),
                role: role.to_string(),
                expires_at,
                created_by,
            },
        );
        id
    }

    /// Revokes a temporary permission or role grant by id, returning the
    /// owning user so the caller can invalidate that user's cached
    /// decisions. `None` if `id` is unknown (already expired or consumed).
    pub fn revoke(&mut self, id: &str) -> Option<String> {
        if let Some(permission) = self.permissions.remove(id) {
            return Some(permission.user);
        }
        if let Some(grant) = self.role_grants.remove(id) {
            return Some(grant.user);
        }
        None
    }

    pub fn revoke_for_user(&mut self, user: &str) {
        self.permissions.retain(|_, p| p.user != user);
        self.role_grants.retain(|_, r| r.user != user);
    }

    /// Temporary roles currently active (not expired) for `user`.
    pub fn active_roles_for(&self, user: &str) -> Vec<String> {
        let now = Utc::now();
        self.role_grants
            .values()
            .filter(|r| r.user == user && r.expires_at > now)
            .map(|r| r.role.clone())
            .collect()
    }

    /// Matches `(resource, action)` against active temporary permissions for
    /// `user`; a matching one-time entry is removed immediately.
    pub fn check(&mut self, user: &str, resource: &str, action: &str) -> Option<OverlayMatch> {
        let now = Utc::now();
        let matched_id = self.permissions.values().find_map(|p| {
            if p.user == user && p.expires_at > now && p.matches(resource, action) {
                Some(p.id.clone())
            } else {
                None
            }
        })?;

        let permission = self.permissions.get_mut(&matched_id).unwrap();
        permission.used_count += 1;
        let one_time = permission.one_time;
        let decision = Decision::allow(DecisionSource::Temporary)
            .with_matched_grant(format!("{}:{}", permission.resource, permission.action));

        if one_time {
            self.permissions.remove(&matched_id);
            Some(OverlayMatch {
                decision,
                consumed_one_time: true,
            })
        } else {
            Some(OverlayMatch {
                decision,
                consumed_one_time: false,
            })
        }
    }

    /// Removes every permission/role grant whose `expires_at` has passed;
    /// returns the ids removed, for cache invalidation and eventing by the
    /// caller.
    pub fn sweep_expired(&mut self) -> Vec<String> {
        let now = Utc::now();
        let mut removed = Vec::new();

        let expired_perms: Vec<String> = self
            .permissions
            .values()
            .filter(|p| p.expires_at <= now)
            .map(|p| p.id.clone())
            .collect();
        for id in expired_perms {
            self.permissions.remove(&id);
            removed.push(id);
        }

        let expired_roles: Vec<String> = self
            .role_grants
            .values()
            .filter(|r| r.expires_at <= now)
            .map(|r| r.id.clone())
            .collect();
        for id in expired_roles {
            self.role_grants.remove(&id);
            removed.push(id);
        }

        removed
    }

    /// Entries expiring within the configured notify-before window.
    pub fn expiring_soon(&self) -> Vec<String> {
        let now = Utc::now();
        let horizon = now + self.notify_before;
        self.permissions
            .values()
            .filter(|p| p.expires_at > now && p.expires_at <= horizon)
            .map(|p| p.id.clone())
            .chain(
                self.role_grants
                    .values()
                    .filter(|r| r.expires_at > now && r.expires_at <= horizon)
                    .map(|r| r.id.clone()),
            )
            .collect()
    }

    pub fn len(&self) -> usize {
        self.permissions.len() + self.role_grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TemporaryOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_temporary_grant_expires() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_temp(
            "carol",
            "sensitive",
            "read",
            Utc::now() + chrono::Duration::hours(1),
            TemporaryGrantOptions::default(),
        );

        assert!(overlay.check("carol", "sensitive", "read").is_some());

        overlay.grant_temp(
            "carol2",
            "sensitive",
            "read",
            Utc::now() - chrono::Duration::hours(2),
            TemporaryGrantOptions::default(),
        );
        assert!(overlay.check("carol2", "sensitive", "read").is_none());
    }

    #[test]
    fn one_time_permission_consumed_on_first_match() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_once("dave", "reports", "export", None);

        let first = overlay.check("dave", "reports", "export").unwrap();
        assert!(first.decision.allowed);
        assert!(first.consumed_one_time);

        assert!(overlay.check("dave", "reports", "export").is_none());
    }

    #[test]
    fn matching_increments_used_count() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_temp(
            "a",
            "x",
            "y",
            Utc::now() + chrono::Duration::hours(1),
            TemporaryGrantOptions::default(),
        );
        overlay.check("a", "x", "y");
        overlay.check("a", "x", "y");
        assert_eq!(overlay.permissions.values().next().unwrap().used_count, 2);
    }

    #[test]
    fn grant_once_defaults_to_24h_expiry() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_once("dave", "reports", "export", None);
        let permission = overlay.permissions.values().next().unwrap();
        let delta = permission.expires_at - Utc::now();
        assert!(delta.num_hours() >= 23);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_temp(
            "a",
            "x",
            "y",
            Utc::now() - chrono::Duration::seconds(1),
            TemporaryGrantOptions::default(),
        );
        overlay.grant_temp(
            "b",
            "x",
            "y",
            Utc::now() + chrono::Duration::hours(1),
            TemporaryGrantOptions::default(),
        );

        let removed = overlay.sweep_expired();
        assert_eq!(removed.len(), 1);
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn expiring_soon_respects_notify_window() {
        let overlay = TemporaryOverlay::new().with_notify_before(chrono::Duration::minutes(10));
        let mut overlay = overlay;
        overlay.grant_temp(
            "a",
            "x",
            "y",
            Utc::now() + chrono::Duration::minutes(5),
            TemporaryGrantOptions::default(),
        );
        overlay.grant_temp(
            "b",
            "x",
            "y",
            Utc::now() + chrono::Duration::hours(2),
            TemporaryGrantOptions::default(),
        );

        assert_eq!(overlay.expiring_soon().len(), 1);
    }

    #[test]
    fn revoke_for_user_drops_permissions_and_role_grants() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_temp(
            "a",
            "x",
            "y",
            Utc::now() + chrono::Duration::hours(1),
            TemporaryGrantOptions::default(),
        );
        overlay.grant_temp_role("a", "editor", Utc::now() + chrono::Duration::hours(1), None);

        overlay.revoke_for_user("a");
        assert!(overlay.is_empty());
    }

    #[test]
    fn wildcard_resource_and_action_match() {
        let mut overlay = TemporaryOverlay::new();
        overlay.grant_temp(
            "a",
            "*",
            "read",
            Utc::now() + chrono::Duration::hours(1),
            TemporaryGrantOptions::default(),
        );
        assert!(overlay.check("a", "anything", "read").is_some());
        assert!(overlay.check("a", "anything", "write").is_none());
    }
}

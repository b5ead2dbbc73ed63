//! Audit trail.
//!
//! Adapted to this engine's event vocabulary and made synchronous: `check()`
//! never awaits, so the trait it writes through does not either (DESIGN.md
//! records why an async trait was not used here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthzEvent {
    Authorization {
        user: String,
        resource: String,
        action: String,
        granted: bool,
        reason: Option<String>,
    },
    RoleMutation {
        op: String,
        role: String,
        actor: Option<String>,
    },
    TemporaryGrant {
        op: String,
        user: String,
        id: String,
    },
    PolicyViolation {
        policy: String,
        details: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub event: AuthzEvent,
    pub context: HashMap<String, String>,
}

impl AuditLogEntry {
    pub fn new(level: AuditLevel, event: AuthzEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            event,
            context: HashMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogFilters {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub level: Option<AuditLevel>,
}

impl LogFilters {
    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(start) = self.start_time {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if entry.timestamp > end {
                return false;
            }
        }
        if let Some(level) = self.level {
            if entry.level != level {
                return false;
            }
        }
        true
    }
}

/// Synchronous audit sink. Implementations must not block the calling
/// thread for long — the engine calls `log` on the decision path.
pub trait AuditLogger: Send + Sync {
    fn log(&self, entry: AuditLogEntry);
    fn get_logs(&self, filters: LogFilters, limit: Option<usize>) -> Vec<AuditLogEntry>;
    fn count_logs(&self, filters: LogFilters) -> u64;
    fn cleanup_old_logs(&self, older_than: DateTime<Utc>) -> u64;
}

/// Bounded in-memory ring, oldest entries trimmed on overflow.
pub struct InMemoryAuditLogger {
    logs: RwLock<Vec<AuditLogEntry>>,
    max_entries: usize,
}

impl InMemoryAuditLogger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, entry: AuditLogEntry) {
        let mut logs = self.logs.write().unwrap();
        logs.push(entry);
        if logs.len() > self.max_entries {
            let overflow = logs.len() - self.max_entries;
            logs.drain(0..overflow);
        }
    }

    fn get_logs(&self, filters: LogFilters, limit: Option<usize>) -> Vec<AuditLogEntry> {
        let logs = self.logs.read().unwrap();
        let filtered = logs.iter().filter(|e| filters.matches(e)).cloned();
        match limit {
            Some(n) => filtered.take(n).collect(),
            None => filtered.collect(),
        }
    }

    fn count_logs(&self, filters: LogFilters) -> u64 {
        self.get_logs(filters, None).len() as u64
    }

    fn cleanup_old_logs(&self, older_than: DateTime<Utc>) -> u64 {
        let mut logs = self.logs.write().unwrap();
        let before = logs.len();
        logs.retain(|e| e.timestamp >= older_than);
        (before - logs.len()) as u64
    }
}

pub mod events {
    use super::*;

    pub fn authz_granted(user: impl Into<String>, resource: impl Into<String>, action: impl Into<String>) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditLevel::Info,
            AuthzEvent::Authorization {
                user: user.into(),
                resource: resource.into(),
                action: action.into(),
                granted: true,
                reason: None,
            },
        )
    }

    pub fn authz_denied(
        user: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        reason: Option<String>,
    ) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditLevel::Warn,
            AuthzEvent::Authorization {
                user: user.into(),
                resource: resource.into(),
                action: action.into(),
                granted: false,
                reason,
            },
        )
    }

    pub fn role_mutation(op: impl Into<String>, role: impl Into<String>, actor: Option<String>) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditLevel::Info,
            AuthzEvent::RoleMutation {
                op: op.into(),
                role: role.into(),
                actor,
            },
        )
    }

    pub fn temporary_grant(op: impl Into<String>, user: impl Into<String>, id: impl Into<String>) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditLevel::Info,
            AuthzEvent::TemporaryGrant {
                op: op.into(),
                user: user.into(),
                id: id.into(),
            },
        )
    }

    pub fn mutation_failed(
        op: impl Into<String>,
        target: impl Into<String>,
        actor: Option<String>,
        level: AuditLevel,
    ) -> AuditLogEntry {
        AuditLogEntry::new(
            level,
            AuthzEvent::RoleMutation {
                op: op.into(),
                role: target.into(),
                actor,
            },
        )
    }

    pub fn policy_violation(policy: impl Into<String>, details: impl Into<String>) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditLevel::Critical,
            AuthzEvent::PolicyViolation {
                policy: policy.into(),
                details: details.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn logs_and_filters_by_level() {
        let logger = InMemoryAuditLogger::new(100);
        logger.log(events::authz_granted("alice", "posts", "read"));
        logger.log(events::authz_denied("bob", "posts", "write", Some("no match".into())));

        assert_eq!(logger.get_logs(LogFilters::default(), None).len(), 2);
        let warn_only = logger.get_logs(
            LogFilters {
                level: Some(AuditLevel::Warn),
                ..Default::default()
            },
            None,
        );
        assert_eq!(warn_only.len(), 1);
    }

    #[test]
    fn trims_to_max_entries() {
        let logger = InMemoryAuditLogger::new(2);
        for _ in 0..5 {
            logger.log(events::authz_granted("a", "r", "x"));
        }
        assert_eq!(logger.count_logs(LogFilters::default()), 2);
    }

    #[test]
    fn cleanup_removes_entries_older_than_cutoff() {
        let logger = InMemoryAuditLogger::new(100);
        logger.log(events::authz_granted("a", "r", "x"));
        let removed = logger.cleanup_old_logs(Utc::now() + Duration::minutes(1));
        assert_eq!(removed, 1);
        assert_eq!(logger.count_logs(LogFilters::default()), 0);
    }

    #[test]
    fn builder_attaches_context() {
        let entry = events::authz_granted("a", "r", "x").with_context("trace_id", "abc");
        assert_eq!(entry.context.get("trace_id"), Some(&"abc".to_string()));
    }
}

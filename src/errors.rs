//! Error types for the authorization engine.
//!
//! `check()` is total and never returns an error — internal evaluation
//! failures resolve to `false` at the point of failure (see `condition.rs`).
//! Only mutation APIs (role/ABAC/policy CRUD, assignments, grants) can fail,
//! and they fail atomically: a rejected mutation never partially applies.

use crate::audit::AuditLevel;
use thiserror::Error;

/// Mutation-API error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthzError {
    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    /// Reserved for callers that prefer an error-style API over `Decision`.
    /// Never returned by `check()` itself.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("circular inheritance: {0}")]
    CircularInheritance(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid permission string: {0}")]
    InvalidPermission(String),
}

/// Result type for mutation operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Coarse severity classification, used to decide whether a mutation failure
/// is worth surfacing through the audit trail at a louder level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzErrorSeverity {
    Low,
    Medium,
    High,
}

impl AuthzError {
    pub fn severity(&self) -> AuthzErrorSeverity {
        match self {
            AuthzError::CircularInheritance(_) => AuthzErrorSeverity::High,
            AuthzError::RoleNotFound(_) | AuthzError::UserNotFound(_) => AuthzErrorSeverity::Medium,
            AuthzError::PermissionDenied(_) => AuthzErrorSeverity::Medium,
            AuthzError::PermissionNotFound(_)
            | AuthzError::InvalidConfig(_)
            | AuthzError::InvalidPermission(_) => AuthzErrorSeverity::Low,
        }
    }

    /// Audit level a failed mutation should be logged at, per `severity()`.
    pub fn audit_level(&self) -> AuditLevel {
        match self.severity() {
            AuthzErrorSeverity::Low => AuditLevel::Info,
            AuthzErrorSeverity::Medium => AuditLevel::Warn,
            AuthzErrorSeverity::High => AuditLevel::Critical,
        }
    }

    /// Stable error code for hosts that want to map errors without matching
    /// on the enum (e.g. across an FFI or serialization boundary).
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::RoleNotFound(_) => "ROLE_NOT_FOUND",
            AuthzError::UserNotFound(_) => "USER_NOT_FOUND",
            AuthzError::PermissionNotFound(_) => "PERMISSION_NOT_FOUND",
            AuthzError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthzError::CircularInheritance(_) => "CIRCULAR_INHERITANCE",
            AuthzError::InvalidConfig(_) => "INVALID_CONFIG",
            AuthzError::InvalidPermission(_) => "INVALID_PERMISSION",
        }
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        AuthzError::InvalidConfig(format!("snapshot serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_classification() {
        assert_eq!(
            AuthzError::CircularInheritance("a->b".into()).severity(),
            AuthzErrorSeverity::High
        );
        assert_eq!(
            AuthzError::RoleNotFound("admin".into()).severity(),
            AuthzErrorSeverity::Medium
        );
        assert_eq!(
            AuthzError::InvalidPermission("bad".into()).severity(),
            AuthzErrorSeverity::Low
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AuthzError::RoleNotFound("x".into()).code(), "ROLE_NOT_FOUND");
        assert_eq!(
            AuthzError::CircularInheritance("x".into()).code(),
            "CIRCULAR_INHERITANCE"
        );
    }

    #[test]
    fn display_messages_include_payload() {
        let err = AuthzError::InvalidPermission("users".into());
        assert_eq!(err.to_string(), "invalid permission string: users");
    }

    #[test]
    fn audit_level_tracks_severity() {
        assert_eq!(
            AuthzError::CircularInheritance("a->b".into()).audit_level(),
            AuditLevel::Critical
        );
        assert_eq!(AuthzError::RoleNotFound("admin".into()).audit_level(), AuditLevel::Warn);
        assert_eq!(
            AuthzError::InvalidPermission("bad".into()).audit_level(),
            AuditLevel::Info
        );
    }
}

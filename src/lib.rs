//! # authzen
//!
//! An embeddable, in-process authorization decision engine combining
//! role-based access control, attribute-based access control, and a policy
//! engine behind one [`service::AuthzEngine::check`] entry point.
//!
//! ## Quick start
//!
//! ```rust
//! use authzen::{AuthzEngine, CheckOptions, EngineConfig, RoleOptions};
//!
//! let engine = AuthzEngine::new(EngineConfig::default());
//! engine.create_role("editor", RoleOptions::default()).unwrap();
//! engine.grant_permission("editor", "posts", "update", false).unwrap();
//! engine.assign_role("alice", "editor").unwrap();
//!
//! let decision = engine.check("alice", "posts", "update", CheckOptions::default());
//! assert!(decision.allowed);
//! ```
//!
//! ## Module map
//!
//! - [`rbac`] — role graph, grants, effective-permission resolution.
//! - [`abac`] — CASL-style ability rules and field-level permissions.
//! - [`policy`] — ordered policy rules with conflict resolution.
//! - [`temporary`] — time-boxed and one-time permission/role overlays.
//! - [`cache`] — LRU decision cache.
//! - [`condition`] — the shared condition-tree evaluator.
//! - [`context`] — decision-context composition and attribute matching.
//! - [`monitor`] — rolling performance metrics and health checks.
//! - [`audit`] — synchronous audit trail.
//! - [`events`] — closure-based eventing.
//! - [`templates`] — built-in role-set seeds.
//! - [`snapshot`] — opaque import/export of engine state.
//! - [`service`] — the [`service::AuthzEngine`] facade tying it all together.

pub mod abac;
pub mod audit;
pub mod cache;
pub mod condition;
pub mod config;
pub mod context;
pub mod decision;
pub mod errors;
pub mod events;
pub mod hash;
pub mod monitor;
pub mod path_cache;
pub mod policy;
pub mod rbac;
pub mod regex_cache;
pub mod service;
pub mod snapshot;
pub mod templates;
pub mod temporary;

pub use abac::{AbacEngine, AbilityRule, AbilityRuleOptions, FieldPermission};
pub use audit::{AuditLevel, AuditLogEntry, AuditLogger, InMemoryAuditLogger, LogFilters};
pub use cache::{CacheStats, DecisionCache};
pub use condition::{Condition, EvalCaches, Operator};
pub use config::EngineConfig;
pub use context::{AttributeKind, AttributeMatcher, ContextBuilder, ContextProvider, CustomMatcher, DecisionContext};
pub use decision::{Decision, DecisionSource};
pub use errors::{AuthzError, AuthzResult};
pub use events::{EventBus, EventKind, EventPayload, Handler, HandlerId};
pub use policy::{ConflictResolution, Effect, PatternList, Policy, PolicyEngine, PolicyRule};
pub use rbac::{PermissionGrant, RbacEngine, Role, RoleChanges, RoleOptions};
pub use service::{AuthzEngine, CheckOptions, EngineStats};
pub use snapshot::EngineSnapshot;
pub use templates::{ApplyOptions, TemplateId};
pub use temporary::{TemporaryGrantOptions, TemporaryOverlay};

#[cfg(feature = "runtime")]
pub use service::SweepTaskGuard;

/// Common imports for embedding the engine into a host application.
pub mod prelude {
    pub use crate::{
        AuthzEngine, CheckOptions, Decision, DecisionContext, DecisionSource, EngineConfig,
        EventKind, RoleOptions, TemplateId,
    };
}

//! The unified engine facade: wires RBAC, ABAC, policy, temporary grants,
//! cache, monitor, audit and eventing behind one `check()` entry point
//! single `check()` entry point.
//!
//! A single `parking_lot::RwLock` guards every piece of mutable engine
//! state: one owning struct composes all the sub-components, sharing one
//! lock instead of each owning its own, since a single `check()` call walks
//! through several of them and needs a consistent view across the whole
//! pipeline.

use crate::abac::{AbacEngine, AbilityRuleOptions, FieldPermission};
use crate::audit::{self, AuditLevel, AuditLogEntry, AuditLogger, InMemoryAuditLogger, LogFilters};
use crate::cache::{cache_key, CacheStats, DecisionCache};
use crate::condition::EvalCaches;
use crate::config::EngineConfig;
use crate::context::{AttributeMatcher, ContextBuilder, ContextProvider, CustomMatcher, DecisionContext};
use crate::decision::{Decision, DecisionSource};
use crate::errors::{AuthzError, AuthzResult};
use crate::events::{EventBus, EventKind, EventPayload, Handler, HandlerId};
use crate::hash::stable_hash;
use crate::monitor::{HealthReport, PerformanceMonitor, PerformanceSnapshot, SlowQueryRecord, Trend};
use crate::policy::{ConflictResolution, Policy, PolicyEngine};
use crate::rbac::{PermissionGrant, RbacEngine, Role, RoleChanges, RoleOptions};
use crate::snapshot::{self, EngineSnapshot};
use crate::templates::{self, ApplyOptions, TemplateId};
use crate::temporary::{TemporaryGrantOptions, TemporaryOverlay};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Options for an individual `check()` call.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Bypass both the cache lookup and the cache write for this call.
    pub skip_cache: bool,
    /// Per-call context, merged over the engine's ambient context. Its
    /// presence (not its contents) is what turns on ABAC evaluation.
    pub context: Option<DecisionContext>,
}

struct EngineState {
    rbac: RbacEngine,
    abac: AbacEngine,
    policy: PolicyEngine,
    temporary: TemporaryOverlay,
    cache: DecisionCache,
    monitor: PerformanceMonitor,
    events: EventBus,
    context_builder: ContextBuilder,
    eval_caches: EvalCaches,
    current_user: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RbacStats {
    pub role_count: usize,
    pub assigned_user_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbacStats {
    pub rule_count: usize,
    pub field_permission_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyStats {
    pub policy_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporaryStats {
    pub active_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateStats {
    pub available: Vec<TemplateId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub log_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub rbac: RbacStats,
    pub abac: AbacStats,
    pub policy: PolicyStats,
    pub cache: CacheStats,
    pub performance: PerformanceSnapshot,
    pub temporary: TemporaryStats,
    pub templates: TemplateStats,
    pub audit: AuditStats,
}

/// The in-process authorization engine. Share across threads via
/// `Arc<AuthzEngine>` — it holds no borrowed state.
pub struct AuthzEngine {
    state: RwLock<EngineState>,
    config: EngineConfig,
    audit: Option<Arc<dyn AuditLogger>>,
}

impl AuthzEngine {
    pub fn new(config: EngineConfig) -> Self {
        let notify_before = chrono::Duration::from_std(config.temporary.notify_before)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        let audit: Option<Arc<dyn AuditLogger>> = if config.enable_audit {
            Some(Arc::new(InMemoryAuditLogger::new(DEFAULT_AUDIT_CAPACITY)))
        } else {
            None
        };

        Self {
            state: RwLock::new(EngineState {
                rbac: RbacEngine::new(config.rbac.max_role_depth),
                abac: AbacEngine::new(config.strict),
                policy: PolicyEngine::new(config.policy.default_conflict_resolution, config.policy.evaluation_budget),
                temporary: TemporaryOverlay::new().with_notify_before(notify_before),
                cache: DecisionCache::new(config.cache.max_size, config.cache.ttl),
                monitor: PerformanceMonitor::new(
                    config.monitor.recent_window,
                    config.monitor.slow_query_capacity,
                    config.monitor.slow_query_threshold,
                ),
                events: EventBus::new(),
                context_builder: ContextBuilder::new(),
                eval_caches: EvalCaches::default().with_attribute_matcher(AttributeMatcher::new(
                    config.condition.case_insensitive,
                    config.condition.partial_string_match,
                )),
                current_user: None,
            }),
            config,
            audit,
        }
    }

    /// Overrides the default in-memory audit sink, e.g. with one that
    /// forwards to a durable store. Has no effect when `config.enable_audit`
    /// is `false` — this swaps the sink, it doesn't turn auditing on.
    pub fn with_audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- ambient context -------------------------------------------------

    pub fn set_ambient_context(&self, context: DecisionContext) {
        self.state.write().context_builder.set_ambient(context);
    }

    pub fn clear_ambient_context(&self) {
        self.state.write().context_builder.clear_ambient();
    }

    pub fn register_context_provider(&self, provider: ContextProvider) {
        self.state.write().context_builder.register_provider(provider);
    }

    pub fn set_current_user(&self, user: impl Into<String>) {
        self.state.write().current_user = Some(user.into());
    }

    pub fn clear_current_user(&self) {
        self.state.write().current_user = None;
    }

    pub fn current_user(&self) -> Option<String> {
        self.state.read().current_user.clone()
    }

    // ---- decision pipeline -------------------------------------------------

    /// Evaluates one `(user, resource, action)` request through the full
    /// pipeline: cache, temporary overlay, RBAC, ABAC (if context given),
    /// policy, default deny — in that order, the first allow winning.
    pub fn check(&self, user: &str, resource: &str, action: &str, options: CheckOptions) -> Decision {
        let start = Instant::now();
        let mut state = self.state.write();

        if self.config.enable_events {
            state.events.emit(
                EventKind::PermissionCheckBefore,
                &json!({"user": user, "resource": resource, "action": action}),
            );
        }

        let built_context = state.context_builder.build(options.context.clone());
        let context_json = built_context.to_json();
        let context_hash = options.context.as_ref().map(|_| stable_hash(&context_json));
        let key = cache_key(user, resource, action, context_hash.as_deref());

        let mut cache_hit = false;
        let mut skip_cache_write = options.skip_cache;

        let mut decision = if !options.skip_cache && self.config.enable_cache {
            let cached = state.cache.get(&key);
            cache_hit = cached.is_some();
            cached.map(|d| d.as_cached())
        } else {
            None
        };

        if decision.is_none() {
            if let Some(overlay_match) = state.temporary.check(user, resource, action) {
                skip_cache_write = skip_cache_write || overlay_match.consumed_one_time;
                decision = Some(overlay_match.decision);
            }
        }

        if decision.is_none() {
            let extra_roles: HashSet<String> = state.temporary.active_roles_for(user).into_iter().collect();
            let rbac_decision = state.rbac.check_with_extra_roles(user, resource, action, &extra_roles);
            if rbac_decision.allowed {
                decision = Some(rbac_decision);
            } else if options.context.is_some() {
                let subject_value = Value::Object(built_context.resource.clone());
                let subject_type = crate::abac::derive_subject_type(&subject_value, resource);
                let state = &mut *state;
                let abac_decision =
                    state
                        .abac
                        .can(action, &subject_type, &subject_value, &context_json, &mut state.eval_caches);
                if abac_decision.allowed {
                    decision = Some(abac_decision);
                }
            }
        }

        if decision.is_none() {
            let mut candidates = vec![user.to_string()];
            candidates.extend(state.rbac.effective_roles(user));
            candidates.extend(state.temporary.active_roles_for(user));

            let state = &mut *state;
            for subject in candidates {
                let policy_decision =
                    state
                        .policy
                        .decide(&subject, resource, action, &context_json, &mut state.eval_caches);
                let is_fallback =
                    policy_decision.allowed && policy_decision.reason.as_deref() == Some("no applicable policy");
                if !is_fallback {
                    decision = Some(policy_decision);
                    break;
                }
            }
        }

        let mut decision = decision.unwrap_or_else(|| {
            if self.config.default_deny {
                Decision::deny("no rbac, abac, or policy match", DecisionSource::Default)
            } else {
                Decision::allow(DecisionSource::Default).with_reason("default-allow configured")
            }
        });

        let duration = start.elapsed();
        decision = decision.with_duration(duration.as_micros().min(u128::from(u64::MAX)) as u64);

        state.monitor.record(user, resource, action, duration, decision.allowed, cache_hit, |record| {
            tracing::warn!(
                user = %record.user,
                resource = %record.resource,
                action = %record.action,
                duration_micros = record.duration.as_micros(),
                "slow authorization decision"
            );
        });

        if self.config.enable_cache && !skip_cache_write {
            state.cache.set(key, decision.clone());
        }

        if self.config.enable_events {
            let payload = serde_json::to_value(&decision).unwrap_or(Value::Null);
            state.events.emit(EventKind::PermissionCheckAfter, &payload);
        }

        if self.config.enable_audit {
            if let Some(logger) = &self.audit {
                let budget_exceeded = decision.source == DecisionSource::Policy
                    && decision.reason.as_deref() == Some("evaluation budget exceeded");
                let entry = if budget_exceeded {
                    audit::events::policy_violation(
                        decision.matched_role.clone().unwrap_or_else(|| "unknown".to_string()),
                        "evaluation budget exceeded",
                    )
                } else if decision.allowed {
                    audit::events::authz_granted(user, resource, action)
                } else {
                    audit::events::authz_denied(user, resource, action, decision.reason.clone())
                };
                logger.log(entry);
            }
        }

        decision
    }

    /// `"resource:action"` convenience wrapper over [`Self::check`].
    pub fn check_permission(&self, user: &str, permission: &str) -> AuthzResult<bool> {
        let grant = PermissionGrant::parse(permission)?;
        Ok(self.check(user, &grant.resource, &grant.action, CheckOptions::default()).allowed)
    }

    /// Evaluates every `(resource, action)` pair independently.
    pub fn check_multiple(&self, user: &str, requests: &[(String, String)]) -> Vec<Decision> {
        requests
            .iter()
            .map(|(resource, action)| self.check(user, resource, action, CheckOptions::default()))
            .collect()
    }

    pub fn check_any(&self, user: &str, requests: &[(String, String)]) -> bool {
        requests
            .iter()
            .any(|(resource, action)| self.check(user, resource, action, CheckOptions::default()).allowed)
    }

    pub fn check_all(&self, user: &str, requests: &[(String, String)]) -> bool {
        requests
            .iter()
            .all(|(resource, action)| self.check(user, resource, action, CheckOptions::default()).allowed)
    }

    // ---- role mutations ------------------------------------------------

    pub fn create_role(&self, name: &str, options: RoleOptions) -> AuthzResult<()> {
        let result = self.state.write().rbac.create_role(name, options);
        if let Err(err) = &result {
            self.audit_mutation_failure("create_role", name, err);
        }
        result
    }

    pub fn update_role(&self, name: &str, changes: RoleChanges) -> AuthzResult<()> {
        let mut state = self.state.write();
        let affected = state.rbac.users_with_role(name);
        if let Err(err) = state.rbac.update_role(name, changes) {
            self.audit_mutation_failure("update_role", name, &err);
            return Err(err);
        }
        for user in &affected {
            state.cache.invalidate_prefix(&format!("{user}|"));
        }
        Ok(())
    }

    pub fn delete_role(&self, name: &str) -> AuthzResult<()> {
        let mut state = self.state.write();
        let affected = state.rbac.users_with_role(name);
        if let Err(err) = state.rbac.delete_role(name) {
            self.audit_mutation_failure("delete_role", name, &err);
            return Err(err);
        }
        for user in &affected {
            state.cache.invalidate_prefix(&format!("{user}|"));
        }
        Ok(())
    }

    pub fn get_role(&self, name: &str) -> Option<Role> {
        self.state.read().rbac.get_role(name).cloned()
    }

    pub fn list_roles(&self) -> Vec<Role> {
        self.state.read().rbac.list_roles().into_iter().cloned().collect()
    }

    pub fn direct_roles(&self, user: &str) -> HashSet<String> {
        self.state.read().rbac.direct_roles(user)
    }

    pub fn effective_roles(&self, user: &str) -> HashSet<String> {
        self.state.read().rbac.effective_roles(user)
    }

    pub fn assign_role(&self, user: &str, role: &str) -> AuthzResult<()> {
        let mut state = self.state.write();
        if let Err(err) = state.rbac.assign_role(user, role) {
            self.audit_mutation_failure("assign_role", role, &err);
            return Err(err);
        }
        state.cache.invalidate_prefix(&format!("{user}|"));
        self.emit_and_audit(
            &mut state,
            EventKind::RoleAssigned,
            json!({"user": user, "role": role}),
            audit::events::role_mutation("assign", role, Some(user.to_string())),
        );
        Ok(())
    }

    pub fn unassign_role(&self, user: &str, role: &str) {
        let mut state = self.state.write();
        state.rbac.unassign_role(user, role);
        state.cache.invalidate_prefix(&format!("{user}|"));
        self.emit_and_audit(
            &mut state,
            EventKind::RoleUnassigned,
            json!({"user": user, "role": role}),
            audit::events::role_mutation("unassign", role, Some(user.to_string())),
        );
    }

    pub fn grant_permission(&self, role: &str, resource: &str, action: &str, recursive: bool) -> AuthzResult<()> {
        let mut state = self.state.write();
        if let Err(err) = state.rbac.grant(role, resource, action, recursive) {
            self.audit_mutation_failure("grant_permission", role, &err);
            return Err(err);
        }
        let affected = state.rbac.users_with_role(role);
        for user in &affected {
            state.cache.invalidate_prefix(&format!("{user}|"));
        }
        self.emit_and_audit(
            &mut state,
            EventKind::PermissionGranted,
            json!({"role": role, "resource": resource, "action": action}),
            audit::events::role_mutation("grant", role, None),
        );
        Ok(())
    }

    pub fn revoke_permission(&self, role: &str, resource: &str, action: &str, recursive: bool) -> AuthzResult<()> {
        let mut state = self.state.write();
        if let Err(err) = state.rbac.revoke(role, resource, action, recursive) {
            self.audit_mutation_failure("revoke_permission", role, &err);
            return Err(err);
        }
        let affected = state.rbac.users_with_role(role);
        for user in &affected {
            state.cache.invalidate_prefix(&format!("{user}|"));
        }
        self.emit_and_audit(
            &mut state,
            EventKind::PermissionRevoked,
            json!({"role": role, "resource": resource, "action": action}),
            audit::events::role_mutation("revoke", role, None),
        );
        Ok(())
    }

    // ---- temporary grants ------------------------------------------------

    pub fn grant_temp_permission(
        &self,
        user: &str,
        resource: &str,
        action: &str,
        expires_at: DateTime<Utc>,
        options: TemporaryGrantOptions,
    ) -> String {
        let mut state = self.state.write();
        let id = state.temporary.grant_temp(user, resource, action, expires_at, options);
        state.cache.invalidate_prefix(&format!("{user}|"));
        self.emit_and_audit(
            &mut state,
            EventKind::PermissionTemporaryGranted,
            json!({"user": user, "resource": resource, "action": action, "id": id}),
            audit::events::temporary_grant("grant", user, &id),
        );
        id
    }

    pub fn grant_once_permission(
        &self,
        user: &str,
        resource: &str,
        action: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> String {
        let mut state = self.state.write();
        let id = state.temporary.grant_once(user, resource, action, expires_at);
        state.cache.invalidate_prefix(&format!("{user}|"));
        self.emit_and_audit(
            &mut state,
            EventKind::PermissionOneTimeGranted,
            json!({"user": user, "resource": resource, "action": action, "id": id}),
            audit::events::temporary_grant("grant-once", user, &id),
        );
        id
    }

    /// Revokes a temporary permission or temporary role grant by id. A
    /// nonexistent id (already expired or consumed) is a no-op.
    pub fn revoke_temp_permission(&self, id: &str) {
        let mut state = self.state.write();
        if let Some(user) = state.temporary.revoke(id) {
            state.cache.invalidate_prefix(&format!("{user}|"));
            self.emit_and_audit(
                &mut state,
                EventKind::PermissionTemporaryRevoked,
                json!({"id": id, "user": user}),
                audit::events::temporary_grant("revoke", &user, id),
            );
        }
    }

    /// Removes expired temporary grants; returns the ids removed. Callable
    /// manually regardless of whether the `runtime` feature's background
    /// sweep task is in use.
    pub fn sweep_expired(&self) -> Vec<String> {
        let mut state = self.state.write();
        let removed = state.temporary.sweep_expired();
        if !removed.is_empty() {
            state.cache.clear();
        }
        removed
    }

    pub fn expiring_soon(&self) -> Vec<String> {
        self.state.read().temporary.expiring_soon()
    }

    // ---- ABAC mutations ------------------------------------------------

    pub fn add_ability_rule(&self, actions: Vec<String>, subjects: Vec<String>, options: AbilityRuleOptions) -> String {
        let mut state = self.state.write();
        let id = state.abac.add_rule(actions, subjects, options);
        state.cache.clear();
        id
    }

    pub fn remove_ability_rule(&self, id: &str) {
        let mut state = self.state.write();
        state.abac.remove_rule(id);
        state.cache.clear();
    }

    pub fn set_field_permission(
        &self,
        subject_type: impl Into<String>,
        action: impl Into<String>,
        permission: FieldPermission,
    ) {
        self.state.write().abac.set_field_permission(subject_type, action, permission);
    }

    pub fn accessible_fields(&self, subject_type: &str, action: &str, context: &Value) -> HashSet<String> {
        let mut state = self.state.write();
        let state = &mut *state;
        state.abac.accessible_fields(subject_type, action, context, &mut state.eval_caches)
    }

    /// Registers a matcher that overrides `eq`/`ne` comparison for one
    /// attribute path across every ABAC and policy condition, taking
    /// precedence over `condition.case_insensitive`/`partial_string_match`.
    pub fn register_attribute_matcher(&self, attribute: impl Into<String>, matcher: CustomMatcher) {
        self.state.write().eval_caches.attributes.register_custom(attribute, matcher);
    }

    // ---- policy mutations ------------------------------------------------

    pub fn add_policy(&self, policy: Policy) -> String {
        let mut state = self.state.write();
        let id = state.policy.add_policy(policy);
        state.cache.clear();
        id
    }

    pub fn remove_policy(&self, id: &str) {
        let mut state = self.state.write();
        state.policy.remove_policy(id);
        state.cache.clear();
    }

    pub fn get_policy(&self, id: &str) -> Option<Policy> {
        self.state.read().policy.get_policy(id).cloned()
    }

    pub fn list_policies(&self) -> Vec<Policy> {
        self.state.read().policy.list_policies().to_vec()
    }

    // ---- templates ------------------------------------------------

    pub fn apply_template(&self, id: TemplateId, options: ApplyOptions) {
        let mut state = self.state.write();
        templates::apply_template(&mut state.rbac, id, options);
        for role in templates::template_role_names(id) {
            let affected = state.rbac.users_with_role(role);
            for user in &affected {
                state.cache.invalidate_prefix(&format!("{user}|"));
            }
        }
    }

    // ---- observability ------------------------------------------------

    pub fn get_stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            rbac: RbacStats {
                role_count: state.rbac.list_roles().len(),
                assigned_user_count: state.rbac.user_role_assignments().len(),
            },
            abac: AbacStats {
                rule_count: state.abac.rules().len(),
                field_permission_count: state.abac.field_permissions().len(),
            },
            policy: PolicyStats {
                policy_count: state.policy.list_policies().len(),
            },
            cache: state.cache.stats(),
            performance: state.monitor.snapshot(),
            temporary: TemporaryStats {
                active_count: state.temporary.len(),
            },
            templates: TemplateStats {
                available: vec![TemplateId::BasicCrud, TemplateId::ContentManagement, TemplateId::UserManagement],
            },
            audit: AuditStats {
                log_count: self.audit.as_ref().map(|a| a.count_logs(LogFilters::default())).unwrap_or(0),
            },
        }
    }

    pub fn get_performance_metrics(&self) -> PerformanceSnapshot {
        self.state.read().monitor.snapshot()
    }

    pub fn get_slow_queries(&self, limit: Option<usize>) -> Vec<SlowQueryRecord> {
        self.state.read().monitor.slow_queries(limit)
    }

    pub fn get_performance_trend(&self) -> Trend {
        self.state.read().monitor.trend()
    }

    pub fn check_performance_health(&self) -> HealthReport {
        self.state.read().monitor.health_check()
    }

    pub fn generate_performance_report(&self) -> String {
        let snapshot = self.get_performance_metrics();
        let health = self.check_performance_health();
        let issues = if health.issues.is_empty() {
            "none".to_string()
        } else {
            health.issues.join("; ")
        };
        format!(
            "checks={} allowed={} denied={} mean={:?} cache_hit_rate={:.1}% slow_queries={} healthy={} issues={issues}",
            snapshot.total_checks,
            snapshot.allowed,
            snapshot.denied,
            snapshot.mean_duration(),
            snapshot.cache_hit_rate() * 100.0,
            snapshot.slow_query_count,
            health.healthy,
        )
    }

    pub fn get_audit_logs(&self, filters: LogFilters, limit: Option<usize>) -> Vec<AuditLogEntry> {
        self.audit.as_ref().map(|a| a.get_logs(filters, limit)).unwrap_or_default()
    }

    // ---- eventing ------------------------------------------------

    pub fn on(&self, event: EventKind, handler: Handler) -> HandlerId {
        self.state.write().events.on(event, handler)
    }

    pub fn once(&self, event: EventKind, handler: Handler) -> HandlerId {
        self.state.write().events.once(event, handler)
    }

    pub fn off(&self, event: EventKind, id: HandlerId) {
        self.state.write().events.off(event, id)
    }

    fn emit_and_audit(&self, state: &mut EngineState, event: EventKind, payload: EventPayload, entry: AuditLogEntry) {
        if self.config.enable_events {
            state.events.emit(event, &payload);
        }
        if self.config.enable_audit {
            if let Some(logger) = &self.audit {
                logger.log(entry);
            }
        }
    }

    /// Records a failed mutation at the audit level its error severity
    /// maps to. Must never touch `self.state` — callers invoke this while
    /// already holding `self.state.write()`.
    fn audit_mutation_failure(&self, op: &str, target: &str, err: &AuthzError) {
        if self.config.enable_audit {
            if let Some(logger) = &self.audit {
                let entry = audit::events::mutation_failed(op, target, None, err.audit_level())
                    .with_context("error", err.to_string());
                logger.log(entry);
            }
        }
    }

    // ---- snapshot ------------------------------------------------

    pub fn export_snapshot(&self) -> EngineSnapshot {
        let state = self.state.read();
        snapshot::export(&state.rbac, &state.abac, &state.policy)
    }

    pub fn import_snapshot(&self, snap: EngineSnapshot) -> AuthzResult<()> {
        let (rbac, abac, policy) = snapshot::import(snap)?;
        let mut state = self.state.write();
        state.rbac = rbac;
        state.abac = abac;
        state.policy = policy;
        state.cache.clear();
        Ok(())
    }
}

impl Default for AuthzEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Optional background sweep of expired temporary grants, cadenced by
/// `EngineConfig::temporary.sweep_interval`. Requires `feature = "runtime"`
/// and an `Arc<AuthzEngine>` since the spawned task holds its own handle.
#[cfg(feature = "runtime")]
pub struct SweepTaskGuard {
    handle: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "runtime")]
impl AuthzEngine {
    pub fn spawn_sweep_task(self: &Arc<Self>, interval: std::time::Duration) -> SweepTaskGuard {
        let engine = Arc::clone(self);
        let handle = tokio::task::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                engine.sweep_expired();
            }
        });
        SweepTaskGuard { handle }
    }
}

#[cfg(feature = "runtime")]
impl Drop for SweepTaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

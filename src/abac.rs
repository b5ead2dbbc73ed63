//! Attribute-based access control engine.
//!
//! Ability rules use CASL-style naming: "subject" names the resource type an
//! action applies to (e.g. `"Post"`), not the acting user — the acting user
//! and other ambient facts travel in the caller-supplied `context` value
//! instead. A rule's condition field paths resolve directly against the
//! subject instance merged over that context, matching the worked example in
//! the distilled spec (`authorId`, not `subject.authorId` or
//! `resource.authorId`).

use crate::condition::{Condition, EvalCaches};
use crate::decision::{Decision, DecisionSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct AbilityRuleOptions {
    pub id: Option<String>,
    pub conditions: Option<Condition>,
    pub inverted: bool,
    pub priority: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityRule {
    pub id: String,
    pub actions: Vec<String>,
    pub subjects: Vec<String>,
    pub conditions: Option<Condition>,
    pub inverted: bool,
    pub priority: i32,
    pub reason: Option<String>,
}

/// Declares which fields of a `(subject-type, action)` pair are visible,
/// optionally gated per-field by a condition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPermission {
    pub allowed: HashSet<String>,
    pub denied: HashSet<String>,
    pub field_conditions: std::collections::HashMap<String, Condition>,
}

/// Resolves a subject's type: its own `"type"` field if present, else the
/// caller-supplied fallback (Rust has no runtime class name to fall back on
/// the way a dynamic host language would).
pub fn derive_subject_type(subject: &Value, fallback: &str) -> String {
    subject
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn build_eval_context(subject: &Value, context: &Value) -> Value {
    let mut merged = context.as_object().cloned().unwrap_or_default();
    if let Some(obj) = subject.as_object() {
        for (k, v) in obj {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

pub struct AbacEngine {
    rules: Vec<AbilityRule>,
    next_id: u64,
    field_permissions: std::collections::HashMap<(String, String), FieldPermission>,
    /// No-match behavior: deny when `true`, allow ("no applicable policy")
    /// otherwise.
    pub strict: bool,
}

impl AbacEngine {
    pub fn new(strict: bool) -> Self {
        Self {
            rules: Vec::new(),
            next_id: 1,
            field_permissions: std::collections::HashMap::new(),
            strict,
        }
    }

    /// Inserts a rule, keeping the rule list sorted by descending priority
    /// with insertion order preserved among equal priorities (a stable sort
    /// over the whole vector achieves this for every insertion since new
    /// rules are always appended before sorting).
    pub fn add_rule(
        &mut self,
        actions: Vec<String>,
        subjects: Vec<String>,
        options: AbilityRuleOptions,
    ) -> String {
        let id = options.id.unwrap_or_else(|| {
            let id = format!("rule-{}", self.next_id);
            self.next_id += 1;
            id
        });
        self.rules.push(AbilityRule {
            id: id.clone(),
            actions,
            subjects,
            conditions: options.conditions,
            inverted: options.inverted,
            priority: options.priority,
            reason: options.reason,
        });
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        id
    }

    pub fn remove_rule(&mut self, id: &str) {
        self.rules.retain(|r| r.id != id);
    }

    pub fn rules(&self) -> &[AbilityRule] {
        &self.rules
    }

    pub fn field_permissions(&self) -> &std::collections::HashMap<(String, String), FieldPermission> {
        &self.field_permissions
    }

    /// Rebuilds an engine from previously exported rules and field
    /// permissions, preserving the priority ordering.
    pub fn restore(
        strict: bool,
        rules: Vec<AbilityRule>,
        field_permissions: std::collections::HashMap<(String, String), FieldPermission>,
    ) -> Self {
        let next_id = rules
            .iter()
            .filter_map(|r| r.id.strip_prefix("rule-").and_then(|n| n.parse::<u64>().ok()))
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);
        let mut engine = Self {
            rules,
            next_id,
            field_permissions,
            strict,
        };
        engine.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        engine
    }

    pub fn set_field_permission(
        &mut self,
        subject_type: impl Into<String>,
        action: impl Into<String>,
        permission: FieldPermission,
    ) {
        self.field_permissions
            .insert((subject_type.into(), action.into()), permission);
    }

    /// Evaluates `(action, subject)` against the registered rules. `subject`
    /// is the resource instance; `context` carries ambient facts (the acting
    /// user, environment, etc.) that field paths may also reference.
    pub fn can(
        &self,
        action: &str,
        subject_type: &str,
        subject: &Value,
        context: &Value,
        caches: &mut EvalCaches,
    ) -> Decision {
        let eval_context = build_eval_context(subject, context);

        // Priority order means the first inverted match we hit is also the
        // highest-priority deny; spec step 3 makes any inverted match win
        // over any allow regardless of relative priority, so return on it
        // immediately rather than collecting the full match set first.
        let mut best_allow: Option<&AbilityRule> = None;

        for rule in &self.rules {
            let action_matches = rule.actions.iter().any(|a| a == action || a == "*");
            if !action_matches {
                continue;
            }
            let subject_matches = rule
                .subjects
                .iter()
                .any(|s| s == subject_type || s == "*");
            if !subject_matches {
                continue;
            }
            if let Some(cond) = &rule.conditions {
                if !cond.evaluate(&eval_context, caches) {
                    continue;
                }
            }

            if rule.inverted {
                return Decision::deny(
                    rule.reason.clone().unwrap_or_else(|| "explicitly denied by rule".into()),
                    DecisionSource::Abac,
                )
                .with_matched_role(rule.id.clone());
            }

            if best_allow.is_none() {
                best_allow = Some(rule);
            }
        }

        match best_allow {
            Some(rule) => Decision::allow(DecisionSource::Abac).with_matched_role(rule.id.clone()),
            None if self.strict => Decision::deny("no matching ability rule", DecisionSource::Abac),
            None => Decision::allow(DecisionSource::Abac).with_reason("no applicable rule"),
        }
    }

    /// `(allowed \ denied)`, filtered to fields whose per-field condition (if
    /// any) evaluates true. Returns the empty set when no declaration exists
    /// for `(subject_type, action)` — callers checking "is there a
    /// declaration at all" should use [`AbacEngine::has_field_declaration`].
    pub fn accessible_fields(
        &self,
        subject_type: &str,
        action: &str,
        context: &Value,
        caches: &mut EvalCaches,
    ) -> HashSet<String> {
        let Some(perm) = self
            .field_permissions
            .get(&(subject_type.to_string(), action.to_string()))
        else {
            return HashSet::new();
        };

        perm.allowed
            .difference(&perm.denied)
            .filter(|field| match perm.field_conditions.get(*field) {
                Some(cond) => cond.evaluate(context, caches),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn has_field_declaration(&self, subject_type: &str, action: &str) -> bool {
        self.field_permissions
            .contains_key(&(subject_type.to_string(), action.to_string()))
    }

    /// Projects `object` onto its accessible fields; returns `object`
    /// unchanged when `(subject_type, action)` has no declaration.
    pub fn filter_fields(
        &self,
        subject_type: &str,
        action: &str,
        object: &Map<String, Value>,
        context: &Value,
        caches: &mut EvalCaches,
    ) -> Map<String, Value> {
        if !self.has_field_declaration(subject_type, action) {
            return object.clone();
        }
        let accessible = self.accessible_fields(subject_type, action, context, caches);
        object
            .iter()
            .filter(|(k, _)| accessible.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

//! Policy engine: rule sets with allow/deny effects and conflict resolution
//! engine.
//!
//! Relevance pre-filtering and rule evaluation are folded into a single pass
//! per policy (resolving an open question about whether relevance-
//! question about the two-pass source behavior) — a policy is walked once,
//! and a rule is only ever inspected at the point it would also be matched.

use crate::condition::{Condition, EvalCaches};
use crate::decision::{Decision, DecisionSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    DenyOverride,
    AllowOverride,
    FirstApplicable,
    OnlyOneApplicable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternList(pub Option<Vec<String>>);

impl PatternList {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn of(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(Some(values.into_iter().map(Into::into).collect()))
    }

    /// Missing list matches everything; otherwise the value itself or `"*"`
    /// must appear in the list.
    fn matches(&self, value: &str) -> bool {
        match &self.0 {
            None => true,
            Some(list) => list.iter().any(|p| p == value || p == "*"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub effect: Effect,
    pub subjects: PatternList,
    pub resources: PatternList,
    pub actions: PatternList,
    pub conditions: Option<Condition>,
    pub priority: i32,
    pub enabled: bool,
}

impl PolicyRule {
    fn matches_patterns(&self, subject: &str, resource: &str, action: &str) -> bool {
        self.subjects.matches(subject)
            && self.resources.matches(resource)
            && self.actions.matches(action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub conflict_resolution: Option<ConflictResolution>,
    pub enabled: bool,
    pub rules: Vec<PolicyRule>,
}

pub struct PolicyEngine {
    policies: Vec<Policy>,
    next_id: u64,
    default_resolution: ConflictResolution,
    evaluation_budget: usize,
}

impl PolicyEngine {
    pub fn new(default_resolution: ConflictResolution, evaluation_budget: usize) -> Self {
        Self {
            policies: Vec::new(),
            next_id: 1,
            default_resolution,
            evaluation_budget: evaluation_budget.max(1),
        }
    }

    pub fn add_policy(&mut self, mut policy: Policy) -> String {
        if policy.id.is_empty() {
            policy.id = format!("policy-{}", self.next_id);
            self.next_id += 1;
        }
        let id = policy.id.clone();
        self.policies.push(policy);
        id
    }

    pub fn remove_policy(&mut self, id: &str) {
        self.policies.retain(|p| p.id != id);
    }

    pub fn get_policy(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    pub fn get_policy_mut(&mut self, id: &str) -> Option<&mut Policy> {
        self.policies.iter_mut().find(|p| p.id == id)
    }

    pub fn list_policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn default_resolution(&self) -> ConflictResolution {
        self.default_resolution
    }

    pub fn evaluation_budget(&self) -> usize {
        self.evaluation_budget
    }

    /// Rebuilds an engine from previously exported policies.
    pub fn restore(default_resolution: ConflictResolution, evaluation_budget: usize, policies: Vec<Policy>) -> Self {
        let next_id = policies
            .iter()
            .filter_map(|p| p.id.strip_prefix("policy-").and_then(|n| n.parse::<u64>().ok()))
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);
        Self {
            policies,
            next_id,
            default_resolution,
            evaluation_budget: evaluation_budget.max(1),
        }
    }

    pub fn decide(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        context: &Value,
        caches: &mut EvalCaches,
    ) -> Decision {
        let mut evaluated = 0usize;

        for policy in self.policies.iter().filter(|p| p.enabled) {
            let mut matched: Vec<&PolicyRule> = Vec::new();

            for rule in policy.rules.iter().filter(|r| r.enabled) {
                if !rule.matches_patterns(subject, resource, action) {
                    continue;
                }

                evaluated += 1;
                if evaluated > self.evaluation_budget {
                    return Decision::deny("evaluation budget exceeded", DecisionSource::Policy)
                        .with_matched_role(policy.id.clone());
                }

                let condition_holds = match &rule.conditions {
                    Some(cond) => cond.evaluate(context, caches),
                    None => true,
                };
                if condition_holds {
                    matched.push(rule);
                }
            }

            if matched.is_empty() {
                continue;
            }

            let resolution = policy.conflict_resolution.unwrap_or(self.default_resolution);
            if let Some(decision) = resolve(&matched, resolution) {
                return decision;
            }
        }

        Decision::allow(DecisionSource::Policy).with_reason("no applicable policy")
    }
}

fn resolve(matched: &[&PolicyRule], resolution: ConflictResolution) -> Option<Decision> {
    match resolution {
        ConflictResolution::DenyOverride => {
            if let Some(rule) = matched.iter().find(|r| r.effect == Effect::Deny) {
                return Some(
                    Decision::deny("denied by policy rule", DecisionSource::Policy)
                        .with_matched_role(rule.id.clone()),
                );
            }
            if let Some(rule) = matched.iter().find(|r| r.effect == Effect::Allow) {
                return Some(
                    Decision::allow(DecisionSource::Policy).with_matched_role(rule.id.clone()),
                );
            }
            Some(Decision::deny("no allow", DecisionSource::Policy))
        }
        ConflictResolution::AllowOverride => {
            if let Some(rule) = matched.iter().find(|r| r.effect == Effect::Allow) {
                return Some(
                    Decision::allow(DecisionSource::Policy).with_matched_role(rule.id.clone()),
                );
            }
            if let Some(rule) = matched.iter().find(|r| r.effect == Effect::Deny) {
                return Some(
                    Decision::deny("denied by policy rule", DecisionSource::Policy)
                        .with_matched_role(rule.id.clone()),
                );
            }
            Some(Decision::deny("no matching rule", DecisionSource::Policy))
        }
        ConflictResolution::FirstApplicable => {
            let mut sorted = matched.to_vec();
            sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
            sorted.first().map(|rule| match rule.effect {
                Effect::Allow => {
                    Decision::allow(DecisionSource::Policy).with_matched_role(rule.id.clone())
                }
                Effect::Deny => Decision::deny("denied by policy rule", DecisionSource::Policy)
                    .with_matched_role(rule.id.clone()),
            })
        }
        ConflictResolution::OnlyOneApplicable => {
            if matched.len() > 1 {
                return Some(Decision::deny("ambiguous", DecisionSource::Policy));
            }
            matched.first().map(|rule| match rule.effect {
                Effect::Allow => {
                    Decision::allow(DecisionSource::Policy).with_matched_role(rule.id.clone())
                }
                Effect::Deny => Decision::deny("denied by policy rule", DecisionSource::Policy)
                    .with_matched_role(rule.id.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use serde_json::json;

    fn caches() -> EvalCaches {
        EvalCaches::default()
    }

    fn rule(id: &str, effect: Effect) -> PolicyRule {
        PolicyRule {
            id: id.into(),
            effect,
            subjects: PatternList::any(),
            resources: PatternList::any(),
            actions: PatternList::any(),
            conditions: None,
            priority: 0,
            enabled: true,
        }
    }

    #[test]
    fn scenario_deny_override_with_both_matching() {
        let mut engine = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "mixed".into(),
            conflict_resolution: Some(ConflictResolution::DenyOverride),
            enabled: true,
            rules: vec![rule("deny1", Effect::Deny), rule("allow1", Effect::Allow)],
        });

        let decision = engine.decide("alice", "posts", "read", &json!({}), &mut caches());
        assert!(!decision.allowed);
    }

    #[test]
    fn allow_override_prefers_allow() {
        let mut engine = PolicyEngine::new(ConflictResolution::AllowOverride, 10_000);
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "mixed".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![rule("deny1", Effect::Deny), rule("allow1", Effect::Allow)],
        });

        let decision = engine.decide("alice", "posts", "read", &json!({}), &mut caches());
        assert!(decision.allowed);
    }

    #[test]
    fn first_applicable_picks_highest_priority() {
        let mut engine = PolicyEngine::new(ConflictResolution::FirstApplicable, 10_000);
        let mut low = rule("low", Effect::Allow);
        low.priority = 1;
        let mut high = rule("high", Effect::Deny);
        high.priority = 5;
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "prioritized".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![low, high],
        });

        let decision = engine.decide("alice", "posts", "read", &json!({}), &mut caches());
        assert!(!decision.allowed);
    }

    #[test]
    fn only_one_applicable_is_ambiguous_with_two_matches() {
        let mut engine = PolicyEngine::new(ConflictResolution::OnlyOneApplicable, 10_000);
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "dual".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![rule("a", Effect::Allow), rule("b", Effect::Allow)],
        });

        let decision = engine.decide("alice", "posts", "read", &json!({}), &mut caches());
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("ambiguous"));
    }

    #[test]
    fn pattern_matching_respects_wildcards_and_missing_lists() {
        let mut engine = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        let mut scoped = rule("scoped", Effect::Deny);
        scoped.resources = PatternList::of(["sensitive"]);
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "scoped".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![scoped],
        });

        assert!(engine.decide("alice", "public", "read", &json!({}), &mut caches()).allowed);
        assert!(!engine.decide("alice", "sensitive", "read", &json!({}), &mut caches()).allowed);
    }

    #[test]
    fn conditions_gate_rule_matching() {
        let mut engine = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        let mut gated = rule("gated", Effect::Deny);
        gated.conditions = Some(Condition::leaf("flagged", Operator::Eq, json!(true)));
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "gated".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![gated],
        });

        assert!(engine
            .decide("alice", "posts", "read", &json!({"flagged": false}), &mut caches())
            .allowed);
        assert!(!engine
            .decide("alice", "posts", "read", &json!({"flagged": true}), &mut caches())
            .allowed);
    }

    #[test]
    fn evaluation_budget_exceeded_denies_immediately() {
        let mut engine = PolicyEngine::new(ConflictResolution::DenyOverride, 2);
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "busy".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![
                rule("a", Effect::Allow),
                rule("b", Effect::Allow),
                rule("c", Effect::Allow),
            ],
        });

        let decision = engine.decide("alice", "posts", "read", &json!({}), &mut caches());
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("evaluation budget exceeded"));
        assert_eq!(decision.matched_role.as_deref(), Some("p1"));
    }

    #[test]
    fn disabled_policy_and_rules_are_skipped() {
        let mut engine = PolicyEngine::new(ConflictResolution::DenyOverride, 10_000);
        let mut disabled_rule = rule("a", Effect::Deny);
        disabled_rule.enabled = false;
        engine.add_policy(Policy {
            id: "p1".into(),
            name: "off".into(),
            conflict_resolution: None,
            enabled: true,
            rules: vec![disabled_rule],
        });
        engine.add_policy(Policy {
            id: "p2".into(),
            name: "also-off".into(),
            conflict_resolution: None,
            enabled: false,
            rules: vec![rule("b", Effect::Deny)],
        });

        assert!(engine.decide("alice", "posts", "read", &json!({}), &mut caches()).allowed);
    }
}

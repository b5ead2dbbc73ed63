//! Decision context composition and attribute matching.
//!
//! A [`DecisionContext`] is the record the condition evaluator and the ABAC
//! and policy engines run their predicates against. Callers are steered
//! towards the typed constructors here instead of building a raw JSON object
//! by hand, so a malformed context (wrong nesting, wrong key) is a compile
//! error rather than a silent always-false predicate at decision time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Subject (user), resource, environment and action, composed for one
/// decision. Field paths used by [`crate::condition::Condition`] trees in the
/// policy engine are resolved against `subject.*`, `resource.*`,
/// `environment.*` and `action.*` of [`DecisionContext::to_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionContext {
    pub subject: Map<String, Value>,
    pub resource: Map<String, Value>,
    pub environment: Map<String, Value>,
    pub action: Map<String, Value>,
}

impl DecisionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the subject sub-context: user id, direct roles, arbitrary
    /// attributes.
    pub fn with_subject(mut self, user_id: impl Into<String>) -> Self {
        self.subject
            .insert("id".to_string(), Value::String(user_id.into()));
        self
    }

    pub fn with_subject_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.subject.insert(
            "roles".to_string(),
            Value::Array(roles.into_iter().map(Value::String).collect()),
        );
        self
    }

    pub fn with_subject_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.subject.insert(key.into(), value.into());
        self
    }

    pub fn with_resource(mut self, resource_type: impl Into<String>) -> Self {
        self.resource
            .insert("type".to_string(), Value::String(resource_type.into()));
        self
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource
            .insert("id".to_string(), Value::String(id.into()));
        self
    }

    pub fn with_resource_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.resource.insert(key.into(), value.into());
        self
    }

    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.action
            .insert("name".to_string(), Value::String(name.into()));
        self
    }

    pub fn with_env_ip(mut self, ip: impl Into<String>) -> Self {
        self.environment
            .insert("ip".to_string(), Value::String(ip.into()));
        self
    }

    pub fn with_env_device(mut self, device: impl Into<String>) -> Self {
        self.environment
            .insert("device".to_string(), Value::String(device.into()));
        self
    }

    pub fn with_env_name(mut self, name: impl Into<String>) -> Self {
        self.environment
            .insert("name".to_string(), Value::String(name.into()));
        self
    }

    pub fn with_env_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Renders the full context as a JSON object for condition evaluation.
    pub fn to_json(&self) -> Value {
        Value::Object(Map::from_iter([
            ("subject".to_string(), Value::Object(self.subject.clone())),
            (
                "resource".to_string(),
                Value::Object(self.resource.clone()),
            ),
            (
                "environment".to_string(),
                Value::Object(self.environment.clone()),
            ),
            ("action".to_string(), Value::Object(self.action.clone())),
        ]))
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject.get("id").and_then(Value::as_str)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource.get("type").and_then(Value::as_str)
    }
}

fn deep_merge_object(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, overlay_value) in overlay {
        match (base.get_mut(key), overlay_value) {
            (Some(Value::Object(base_map)), Value::Object(overlay_map)) => {
                deep_merge_object(base_map, overlay_map);
            }
            _ => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

/// Registered function that fills in missing context keys lazily — e.g. a
/// geo-IP lookup keyed off `environment.ip`, or a tenant lookup keyed off
/// `subject.id`. Providers never overwrite a key the caller or the ambient
/// context already supplied.
pub type ContextProvider = Box<dyn Fn(&mut DecisionContext) + Send + Sync>;

/// Composes per-call context over an ambient context over provider defaults,
/// in order of decreasing precedence (highest first).
#[derive(Default)]
pub struct ContextBuilder {
    ambient: Option<DecisionContext>,
    providers: Vec<ContextProvider>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ambient(&mut self, context: DecisionContext) {
        self.ambient = Some(context);
    }

    pub fn clear_ambient(&mut self) {
        self.ambient = None;
    }

    pub fn register_provider(&mut self, provider: ContextProvider) {
        self.providers.push(provider);
    }

    pub fn build(&self, per_call: Option<DecisionContext>) -> DecisionContext {
        let mut merged = self.ambient.clone().unwrap_or_default();

        if let Some(call) = per_call {
            deep_merge_object(&mut merged.subject, &call.subject);
            deep_merge_object(&mut merged.resource, &call.resource);
            deep_merge_object(&mut merged.environment, &call.environment);
            deep_merge_object(&mut merged.action, &call.action);
        }

        if !merged.environment.contains_key("timestamp") {
            merged.environment.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        for provider in &self.providers {
            provider(&mut merged);
        }

        merged
    }
}

/// Attribute value kinds the matcher understands explicitly; anything else
/// falls back to JSON structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

pub fn attribute_kind(value: &Value) -> AttributeKind {
    match value {
        Value::String(s) if chrono::DateTime::parse_from_rfc3339(s).is_ok() => AttributeKind::Date,
        Value::String(_) => AttributeKind::String,
        Value::Number(_) => AttributeKind::Number,
        Value::Bool(_) => AttributeKind::Boolean,
        Value::Array(_) => AttributeKind::Array,
        _ => AttributeKind::Object,
    }
}

pub type CustomMatcher = Box<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Compares typed attribute values with configurable string-comparison
/// behavior; per-attribute custom matchers take precedence over the default
/// rules.
#[derive(Default)]
pub struct AttributeMatcher {
    pub case_insensitive: bool,
    pub partial_string_match: bool,
    custom: HashMap<String, CustomMatcher>,
}

impl AttributeMatcher {
    pub fn new(case_insensitive: bool, partial_string_match: bool) -> Self {
        Self {
            case_insensitive,
            partial_string_match,
            custom: HashMap::new(),
        }
    }

    pub fn register_custom(&mut self, attribute: impl Into<String>, matcher: CustomMatcher) {
        self.custom.insert(attribute.into(), matcher);
    }

    pub fn matches(&self, attribute: &str, actual: &Value, expected: &Value) -> bool {
        if let Some(custom) = self.custom.get(attribute) {
            return custom(actual, expected);
        }

        match (actual, expected) {
            (Value::String(a), Value::String(e)) => {
                let (a, e) = if self.case_insensitive {
                    (a.to_lowercase(), e.to_lowercase())
                } else {
                    (a.clone(), e.clone())
                };
                if self.partial_string_match {
                    a.contains(&e)
                } else {
                    a == e
                }
            }
            _ => actual == expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_composes_subject_resource_action() {
        let ctx = DecisionContext::new()
            .with_subject("bob")
            .with_resource("Post")
            .with_resource_attr("authorId", "bob")
            .with_action("update");

        let json = ctx.to_json();
        assert_eq!(json["subject"]["id"], "bob");
        assert_eq!(json["resource"]["type"], "Post");
        assert_eq!(json["resource"]["authorId"], "bob");
        assert_eq!(json["action"]["name"], "update");
    }

    #[test]
    fn per_call_context_wins_over_ambient_on_conflict() {
        let mut builder = ContextBuilder::new();
        builder.set_ambient(DecisionContext::new().with_subject_attr("tier", "free"));

        let built = builder.build(Some(DecisionContext::new().with_subject_attr("tier", "pro")));
        assert_eq!(built.subject.get("tier"), Some(&json!("pro")));
    }

    #[test]
    fn ambient_fields_survive_when_call_omits_them() {
        let mut builder = ContextBuilder::new();
        builder.set_ambient(DecisionContext::new().with_env_name("staging"));

        let built = builder.build(Some(DecisionContext::new().with_subject("bob")));
        assert_eq!(built.environment.get("name"), Some(&json!("staging")));
        assert_eq!(built.subject.get("id"), Some(&json!("bob")));
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let builder = ContextBuilder::new();
        let built = builder.build(None);
        assert!(built.environment.contains_key("timestamp"));
    }

    #[test]
    fn providers_fill_missing_keys_without_overwriting() {
        let mut builder = ContextBuilder::new();
        builder.register_provider(Box::new(|ctx| {
            ctx.subject
                .entry("tenant".to_string())
                .or_insert_with(|| json!("default"));
        }));

        let built = builder.build(Some(DecisionContext::new().with_subject_attr("tenant", "acme")));
        assert_eq!(built.subject.get("tenant"), Some(&json!("acme")));

        let built = builder.build(None);
        assert_eq!(built.subject.get("tenant"), Some(&json!("default")));
    }

    #[test]
    fn attribute_matcher_case_insensitive_and_partial() {
        let matcher = AttributeMatcher::new(true, true);
        assert!(matcher.matches("name", &json!("Alice Smith"), &json!("alice")));
        assert!(!AttributeMatcher::new(false, false).matches(
            "name",
            &json!("Alice Smith"),
            &json!("alice")
        ));
    }

    #[test]
    fn custom_matcher_takes_precedence() {
        let mut matcher = AttributeMatcher::default();
        matcher.register_custom("always_true", Box::new(|_, _| true));
        assert!(matcher.matches("always_true", &json!(1), &json!(2)));
    }
}

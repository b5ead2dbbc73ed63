//! Condition tree and its evaluator.
//!
//! A condition tree is a tagged sum of a leaf predicate over a dotted field
//! path, or a composite boolean combinator over child trees — never a class
//! hierarchy, per the Design Notes' rejection of dynamic dispatch for this
//! kind of variant set. Evaluation is total: any internal failure (a missing
//! path segment, a value of the wrong shape, a malformed regex) resolves to
//! `false` at the leaf, never panics, never propagates an error.

use crate::context::AttributeMatcher;
use crate::path_cache::PathCache;
use crate::regex_cache::RegexCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    Exists,
}

/// Boolean combinators for composite nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A condition tree node: either a leaf predicate or a composite combinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Leaf {
        field: String,
        operator: Operator,
        #[serde(default)]
        value: Value,
    },
    Composite {
        operator: LogicalOperator,
        children: Vec<Condition>,
    },
}

impl Condition {
    pub fn leaf(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Condition::Leaf {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn and(children: Vec<Condition>) -> Self {
        Condition::Composite {
            operator: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<Condition>) -> Self {
        Condition::Composite {
            operator: LogicalOperator::Or,
            children,
        }
    }

    pub fn not(child: Condition) -> Self {
        Condition::Composite {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    /// Evaluate the tree against a context, never failing.
    pub fn evaluate(&self, context: &Value, caches: &mut EvalCaches) -> bool {
        match self {
            Condition::Leaf {
                field,
                operator,
                value,
            } => evaluate_leaf(context, field, *operator, value, caches),
            Condition::Composite { operator, children } => match operator {
                LogicalOperator::And => children.iter().all(|c| c.evaluate(context, caches)),
                LogicalOperator::Or => children.iter().any(|c| c.evaluate(context, caches)),
                LogicalOperator::Not => {
                    !children.first().is_some_and(|c| c.evaluate(context, caches))
                }
            },
        }
    }
}

/// Mutable scratch state threaded through evaluation: the path-segment cache,
/// the compiled-regex cache, and the attribute matcher `eq`/`ne` consult for
/// string comparisons — all bounded and owned by the engine.
pub struct EvalCaches {
    pub paths: PathCache,
    pub regex: RegexCache,
    pub attributes: AttributeMatcher,
}

impl EvalCaches {
    pub fn new(path_capacity: usize, regex_capacity: usize) -> Self {
        Self {
            paths: PathCache::new(path_capacity),
            regex: RegexCache::new(regex_capacity),
            attributes: AttributeMatcher::default(),
        }
    }

    pub fn with_attribute_matcher(mut self, matcher: AttributeMatcher) -> Self {
        self.attributes = matcher;
        self
    }
}

impl Default for EvalCaches {
    fn default() -> Self {
        Self::new(1_000, 256)
    }
}

/// Resolves a dotted path against an object-shaped context. Returns `None`
/// when any segment is absent ("undefined"); returns `Some(&Value::Null)`
/// when the path resolves to an explicit null, so `exists` can tell the two
/// apart.
fn resolve_path<'a>(context: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = context;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn evaluate_leaf(
    context: &Value,
    field: &str,
    operator: Operator,
    expected: &Value,
    caches: &mut EvalCaches,
) -> bool {
    let segments = caches.paths.segments(field);
    let actual = resolve_path(context, &segments);

    match operator {
        Operator::Exists => actual.is_some_and(|v| !v.is_null()),
        Operator::Eq => actual.is_some_and(|v| caches.attributes.matches(field, v, expected)),
        Operator::Ne => actual
            .map(|v| !caches.attributes.matches(field, v, expected))
            .unwrap_or(true),
        Operator::Gt => compare_numeric(actual, expected, |a, b| a > b),
        Operator::Gte => compare_numeric(actual, expected, |a, b| a >= b),
        Operator::Lt => compare_numeric(actual, expected, |a, b| a < b),
        Operator::Lte => compare_numeric(actual, expected, |a, b| a <= b),
        Operator::In => {
            let Some(actual) = actual else { return false };
            expected
                .as_array()
                .is_some_and(|arr| arr.iter().any(|item| item == actual))
        }
        Operator::NotIn => {
            let Some(actual) = actual else { return false };
            expected
                .as_array()
                .is_some_and(|arr| !arr.iter().any(|item| item == actual))
        }
        Operator::Contains => evaluate_contains(actual, expected),
        Operator::NotContains => !evaluate_contains(actual, expected),
        Operator::StartsWith => compare_strings(actual, expected, |a, b| a.starts_with(b)),
        Operator::EndsWith => compare_strings(actual, expected, |a, b| a.ends_with(b)),
        Operator::Regex => evaluate_regex(actual, expected, caches),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn compare_numeric(actual: Option<&Value>, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    let (Some(a), Some(e)) = (actual.and_then(coerce_number), coerce_number(expected)) else {
        return false;
    };
    if !a.is_finite() || !e.is_finite() {
        return false;
    }
    op(a, e)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_strings(actual: Option<&Value>, expected: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    let (Some(a), Some(e)) = (
        actual.and_then(value_to_string),
        value_to_string(expected),
    ) else {
        return false;
    };
    op(&a, &e)
}

fn evaluate_contains(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(Value::String(s)) => expected
            .as_str()
            .is_some_and(|needle| s.contains(needle)),
        _ => false,
    }
}

fn evaluate_regex(actual: Option<&Value>, expected: &Value, caches: &mut EvalCaches) -> bool {
    let (Some(actual), Some(pattern)) = (
        actual.and_then(value_to_string),
        expected.as_str(),
    ) else {
        return false;
    };
    match caches.regex.get_or_compile(pattern) {
        Some(re) => re.is_match(&actual),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        json!({
            "user": {"id": "bob", "age": 30, "tags": ["admin", "staff"]},
            "resource": {"authorId": "bob", "public": true},
        })
    }

    fn caches() -> EvalCaches {
        EvalCaches::default()
    }

    #[test]
    fn eq_and_ne() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.id", Operator::Eq, json!("bob")).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.id", Operator::Ne, json!("alice")).evaluate(&c, &mut e));
        assert!(!Condition::leaf("user.id", Operator::Eq, json!("alice")).evaluate(&c, &mut e));
    }

    #[test]
    fn ordering_coerces_numbers() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.age", Operator::Gte, json!(30)).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.age", Operator::Lt, json!("31")).evaluate(&c, &mut e));
        assert!(!Condition::leaf("user.age", Operator::Gt, json!("not-a-number")).evaluate(&c, &mut e));
    }

    #[test]
    fn membership_operators() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.id", Operator::In, json!(["bob", "alice"])).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.id", Operator::NotIn, json!(["alice"])).evaluate(&c, &mut e));
    }

    #[test]
    fn contains_array_and_string() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.tags", Operator::Contains, json!("admin")).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.id", Operator::Contains, json!("ob")).evaluate(&c, &mut e));
        assert!(!Condition::leaf("resource.public", Operator::Contains, json!("x")).evaluate(&c, &mut e));
    }

    #[test]
    fn prefix_suffix() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.id", Operator::StartsWith, json!("b")).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.id", Operator::EndsWith, json!("ob")).evaluate(&c, &mut e));
    }

    #[test]
    fn regex_matches_and_never_panics_on_bad_pattern() {
        let c = ctx();
        let mut e = caches();
        assert!(Condition::leaf("user.id", Operator::Regex, json!("^b.b$")).evaluate(&c, &mut e));
        assert!(!Condition::leaf("user.id", Operator::Regex, json!("(unclosed")).evaluate(&c, &mut e));
    }

    #[test]
    fn exists_distinguishes_absent_from_null() {
        let c = json!({"a": null});
        let mut e = caches();
        assert!(!Condition::leaf("a", Operator::Exists, Value::Null).evaluate(&c, &mut e));
        assert!(!Condition::leaf("missing", Operator::Exists, Value::Null).evaluate(&c, &mut e));
        assert!(Condition::leaf("user.id", Operator::Exists, Value::Null).evaluate(&ctx(), &mut e));
    }

    #[test]
    fn missing_path_is_total_not_error() {
        let c = ctx();
        let mut e = caches();
        assert!(!Condition::leaf("nope.nope", Operator::Eq, json!(1)).evaluate(&c, &mut e));
        assert!(!Condition::leaf("user.id.nested", Operator::Eq, json!(1)).evaluate(&c, &mut e));
    }

    #[test]
    fn attribute_matcher_config_affects_eq_outcome() {
        let c = json!({"user": {"id": "BOB"}});
        let mut default_caches = caches();
        assert!(!Condition::leaf("user.id", Operator::Eq, json!("bob")).evaluate(&c, &mut default_caches));

        let mut relaxed_caches = EvalCaches::new(1_000, 256)
            .with_attribute_matcher(crate::context::AttributeMatcher::new(true, false));
        assert!(Condition::leaf("user.id", Operator::Eq, json!("bob")).evaluate(&c, &mut relaxed_caches));
        assert!(!Condition::leaf("user.id", Operator::Ne, json!("bob")).evaluate(&c, &mut relaxed_caches));
    }

    #[test]
    fn composites_short_circuit() {
        let c = ctx();
        let mut e = caches();
        let tree = Condition::and(vec![
            Condition::leaf("user.id", Operator::Eq, json!("bob")),
            Condition::leaf("resource.authorId", Operator::Eq, json!("bob")),
        ]);
        assert!(tree.evaluate(&c, &mut e));

        let tree = Condition::or(vec![
            Condition::leaf("user.id", Operator::Eq, json!("nope")),
            Condition::leaf("resource.public", Operator::Eq, json!(true)),
        ]);
        assert!(tree.evaluate(&c, &mut e));

        let tree = Condition::not(Condition::leaf("user.id", Operator::Eq, json!("nope")));
        assert!(tree.evaluate(&c, &mut e));
    }
}

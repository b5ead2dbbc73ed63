//! The unified decision payload returned by every `check()`-shaped call
//! the decision pipeline.

use serde::{Deserialize, Serialize};

/// Which stage of the pipeline produced the decision. Exposed mainly for
/// observability (`get_stats()`, audit entries); callers deciding whether to
/// allow an action only need `allowed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    Cache,
    Temporary,
    Rbac,
    Abac,
    Policy,
    /// No stage produced an allow; the pipeline's default-deny fired.
    Default,
}

/// `{allowed, duration, matched-role?, matched-grant?, reason?}` from
/// Widened with a `source` tag and a `cached` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub duration_micros: u64,
    pub matched_role: Option<String>,
    pub matched_grant: Option<String>,
    pub reason: Option<String>,
    pub source: DecisionSource,
    pub cached: bool,
}

impl Decision {
    pub fn deny(reason: impl Into<String>, source: DecisionSource) -> Self {
        Self {
            allowed: false,
            duration_micros: 0,
            matched_role: None,
            matched_grant: None,
            reason: Some(reason.into()),
            source,
            cached: false,
        }
    }

    pub fn allow(source: DecisionSource) -> Self {
        Self {
            allowed: true,
            duration_micros: 0,
            matched_role: None,
            matched_grant: None,
            reason: None,
            source,
            cached: false,
        }
    }

    pub fn with_duration(mut self, duration_micros: u64) -> Self {
        self.duration_micros = duration_micros;
        self
    }

    pub fn with_matched_role(mut self, role: impl Into<String>) -> Self {
        self.matched_role = Some(role.into());
        self
    }

    pub fn with_matched_grant(mut self, grant: impl Into<String>) -> Self {
        self.matched_grant = Some(grant.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn as_cached(mut self) -> Self {
        self.cached = true;
        self
    }
}

//! Engine configuration.
//!
//! All configuration is programmatic at construction — no environment
//! variables are read. One top-level struct composes one sub-struct per
//! component: `{enable_cache, cache, enable_audit, enable_events, strict,
//! default_deny}` plus the sub-configs left implicit elsewhere (temporary-
//! overlay cadence, monitor thresholds, role-graph depth).

use crate::policy::ConflictResolution;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub enable_cache: bool,
    pub cache: CacheConfig,
    pub enable_audit: bool,
    pub enable_events: bool,
    /// ABAC/policy no-match behavior: deny when `true`.
    pub strict: bool,
    /// Fallback when no component produces a decision.
    pub default_deny: bool,
    pub rbac: RbacConfig,
    pub temporary: TemporaryConfig,
    pub monitor: MonitorConfig,
    pub policy: PolicyConfig,
    pub condition: ConditionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache: CacheConfig::default(),
            enable_audit: true,
            enable_events: true,
            strict: true,
            default_deny: true,
            rbac: RbacConfig::default(),
            temporary: TemporaryConfig::default(),
            monitor: MonitorConfig::default(),
            policy: PolicyConfig::default(),
            condition: ConditionConfig::default(),
        }
    }
}

/// Controls how `eq`/`ne` leaf conditions compare string attributes across
/// the ABAC and policy engines.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub case_insensitive: bool,
    pub partial_string_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size: usize,
    #[serde(with = "duration_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacConfig {
    pub max_role_depth: usize,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self { max_role_depth: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryConfig {
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,
    #[serde(with = "duration_serde")]
    pub notify_before: Duration,
}

impl Default for TemporaryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            notify_before: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub recent_window: usize,
    pub slow_query_capacity: usize,
    #[serde(with = "duration_serde")]
    pub slow_query_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            recent_window: 100,
            slow_query_capacity: 100,
            slow_query_threshold: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub default_conflict_resolution: ConflictResolution,
    pub evaluation_budget: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_conflict_resolution: ConflictResolution::DenyOverride,
            evaluation_budget: 10_000,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = EngineConfig::default();
        assert!(config.enable_cache);
        assert!(config.default_deny);
        assert_eq!(config.cache.max_size, 10_000);
        assert_eq!(config.rbac.max_role_depth, 10);
    }

    #[test]
    fn cache_config_round_trips_through_json() {
        let config = CacheConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.max_size, config.max_size);
        assert_eq!(restored.ttl, config.ttl);
    }
}

//! Performance monitor: rolling metrics, slow-query ring, trend analysis,
//! health check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQueryRecord {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub resource: String,
    pub action: String,
    pub duration: Duration,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_checks: u64,
    pub allowed: u64,
    pub denied: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub slow_query_count: u64,
    #[serde(with = "duration_micros")]
    pub cumulative_duration: Duration,
    #[serde(with = "duration_micros")]
    pub min_duration: Duration,
    #[serde(with = "duration_micros")]
    pub max_duration: Duration,
}

impl PerformanceSnapshot {
    pub fn mean_duration(&self) -> Duration {
        if self.total_checks == 0 {
            Duration::ZERO
        } else {
            self.cumulative_duration / self.total_checks as u32
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn slow_query_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.slow_query_count as f64 / self.total_checks as f64
        }
    }
}

mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_micros())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let micros = u128::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros.min(u64::MAX as u128) as u64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Degrading,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
}

pub struct PerformanceMonitor {
    snapshot: PerformanceSnapshot,
    recent_durations: VecDeque<Duration>,
    recent_capacity: usize,
    slow_queries: VecDeque<SlowQueryRecord>,
    slow_query_cap: usize,
    slow_threshold: Duration,
    last_slow_warning: Option<DateTime<Utc>>,
    warning_throttle: chrono::Duration,
}

impl PerformanceMonitor {
    pub fn new(recent_capacity: usize, slow_query_cap: usize, slow_threshold: Duration) -> Self {
        Self {
            snapshot: PerformanceSnapshot {
                min_duration: Duration::MAX,
                ..Default::default()
            },
            recent_durations: VecDeque::new(),
            recent_capacity: recent_capacity.max(1),
            slow_queries: VecDeque::new(),
            slow_query_cap: slow_query_cap.max(1),
            slow_threshold,
            last_slow_warning: None,
            warning_throttle: chrono::Duration::seconds(5),
        }
    }

    /// `warn` is invoked at most once per throttle window when a slow query
    /// lands; callers pass `tracing::warn!` (or a test spy).
    pub fn record(
        &mut self,
        user: &str,
        resource: &str,
        action: &str,
        duration: Duration,
        allowed: bool,
        cache_hit: bool,
        mut warn: impl FnMut(&SlowQueryRecord),
    ) {
        self.snapshot.total_checks += 1;
        if allowed {
            self.snapshot.allowed += 1;
        } else {
            self.snapshot.denied += 1;
        }
        if cache_hit {
            self.snapshot.cache_hits += 1;
        } else {
            self.snapshot.cache_misses += 1;
        }
        self.snapshot.cumulative_duration += duration;
        self.snapshot.min_duration = self.snapshot.min_duration.min(duration);
        self.snapshot.max_duration = self.snapshot.max_duration.max(duration);

        if self.recent_durations.len() >= self.recent_capacity {
            self.recent_durations.pop_front();
        }
        self.recent_durations.push_back(duration);

        if duration > self.slow_threshold {
            self.snapshot.slow_query_count += 1;
            let record = SlowQueryRecord {
                timestamp: Utc::now(),
                user: user.to_string(),
                resource: resource.to_string(),
                action: action.to_string(),
                duration,
                cache_hit,
            };

            if self.slow_queries.len() >= self.slow_query_cap {
                self.slow_queries.pop_front();
            }

            let now = record.timestamp;
            let should_warn = self
                .last_slow_warning
                .map(|last| now.signed_duration_since(last) >= self.warning_throttle)
                .unwrap_or(true);
            if should_warn {
                warn(&record);
                self.last_slow_warning = Some(now);
            }

            self.slow_queries.push_back(record);
        }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let mut s = self.snapshot;
        if s.min_duration == Duration::MAX {
            s.min_duration = Duration::ZERO;
        }
        s
    }

    pub fn slow_queries(&self, limit: Option<usize>) -> Vec<SlowQueryRecord> {
        match limit {
            Some(n) => self.slow_queries.iter().rev().take(n).cloned().collect(),
            None => self.slow_queries.iter().cloned().collect(),
        }
    }

    fn recent_average(&self, durations: impl Iterator<Item = Duration> + Clone) -> Duration {
        let (sum, count) = durations.fold((Duration::ZERO, 0u32), |(sum, count), d| (sum + d, count + 1));
        if count == 0 {
            Duration::ZERO
        } else {
            sum / count
        }
    }

    pub fn recent_average_duration(&self) -> Duration {
        self.recent_average(self.recent_durations.iter().copied())
    }

    /// Splits the recent window in half and compares averages.
    pub fn trend(&self) -> Trend {
        let len = self.recent_durations.len();
        if len < 4 {
            return Trend::Stable;
        }
        let mid = len / 2;
        let first_half = self.recent_average(self.recent_durations.iter().take(mid).copied());
        let second_half = self.recent_average(self.recent_durations.iter().skip(mid).copied());

        if first_half.is_zero() {
            return Trend::Stable;
        }
        let percent_change =
            (second_half.as_secs_f64() - first_half.as_secs_f64()) / first_half.as_secs_f64() * 100.0;

        if percent_change < -10.0 {
            Trend::Improving
        } else if percent_change > 10.0 {
            Trend::Degrading
        } else {
            Trend::Stable
        }
    }

    pub fn health_check(&self) -> HealthReport {
        let snapshot = self.snapshot();
        let mut issues = Vec::new();

        if snapshot.mean_duration() > Duration::from_micros(500) {
            issues.push("mean decision duration exceeds 0.5ms".to_string());
        }
        if snapshot.total_checks >= 100 && snapshot.cache_hit_rate() < 0.70 {
            issues.push("cache hit rate below 70%".to_string());
        }
        if snapshot.total_checks >= 100 && snapshot.slow_query_rate() > 0.05 {
            issues.push("slow query rate above 5%".to_string());
        }
        if snapshot.max_duration > Duration::from_millis(10) {
            issues.push("maximum decision duration exceeds 10ms".to_string());
        }

        HealthReport {
            healthy: issues.is_empty(),
            issues,
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(100, 100, Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &SlowQueryRecord) {}

    #[test]
    fn rolling_metrics_accumulate() {
        let mut monitor = PerformanceMonitor::default();
        monitor.record("u", "r", "a", Duration::from_micros(100), true, true, noop);
        monitor.record("u", "r", "a", Duration::from_micros(200), false, false, noop);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_checks, 2);
        assert_eq!(snapshot.allowed, 1);
        assert_eq!(snapshot.denied, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.min_duration, Duration::from_micros(100));
        assert_eq!(snapshot.max_duration, Duration::from_micros(200));
    }

    #[test]
    fn slow_query_ring_never_exceeds_cap() {
        let mut monitor = PerformanceMonitor::new(100, 3, Duration::from_micros(1));
        for _ in 0..10 {
            monitor.record("u", "r", "a", Duration::from_millis(5), true, false, noop);
        }
        assert_eq!(monitor.slow_queries(None).len(), 3);
    }

    #[test]
    fn recent_average_only_considers_last_n() {
        let mut monitor = PerformanceMonitor::new(2, 100, Duration::from_secs(1));
        monitor.record("u", "r", "a", Duration::from_micros(100), true, true, noop);
        monitor.record("u", "r", "a", Duration::from_micros(200), true, true, noop);
        monitor.record("u", "r", "a", Duration::from_micros(300), true, true, noop);

        assert_eq!(monitor.recent_average_duration(), Duration::from_micros(250));
    }

    #[test]
    fn trend_detects_degradation_and_improvement() {
        let mut degrading = PerformanceMonitor::new(100, 100, Duration::from_secs(1));
        for d in [10, 10, 10, 10, 50, 50, 50, 50] {
            degrading.record("u", "r", "a", Duration::from_micros(d), true, true, noop);
        }
        assert_eq!(degrading.trend(), Trend::Degrading);

        let mut improving = PerformanceMonitor::new(100, 100, Duration::from_secs(1));
        for d in [50, 50, 50, 50, 10, 10, 10, 10] {
            improving.record("u", "r", "a", Duration::from_micros(d), true, true, noop);
        }
        assert_eq!(improving.trend(), Trend::Improving);
    }

    #[test]
    fn health_check_flags_low_cache_hit_rate() {
        let mut monitor = PerformanceMonitor::default();
        for _ in 0..100 {
            monitor.record("u", "r", "a", Duration::from_micros(10), true, false, noop);
        }
        let report = monitor.health_check();
        assert!(!report.healthy);
        assert!(report.issues.iter().any(|i| i.contains("cache hit rate")));
    }

    #[test]
    fn health_check_is_healthy_under_default_empty_state() {
        let monitor = PerformanceMonitor::default();
        assert!(monitor.health_check().healthy);
    }

    #[test]
    fn slow_warning_is_throttled() {
        let mut monitor = PerformanceMonitor::new(100, 100, Duration::from_micros(1));
        let mut calls = 0;
        for _ in 0..5 {
            monitor.record("u", "r", "a", Duration::from_millis(2), true, false, |_| calls += 1);
        }
        assert_eq!(calls, 1);
    }
}

//! Bounded, per-pattern compiled-regex cache.
//!
//! This resolves an open question:
//! regex patterns used by the `regex` condition operator are compiled once
//! per distinct pattern string and reused, instead of being recompiled on
//! every evaluation. A pattern that fails to compile is cached as `None` so
//! a malformed rule does not pay the compilation cost (or the allocation for
//! the error) more than once; lookups against it simply evaluate to `false`.

use regex::Regex;
use std::collections::{HashMap, VecDeque};

pub struct RegexCache {
    capacity: usize,
    order: VecDeque<String>,
    compiled: HashMap<String, Option<Regex>>,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            compiled: HashMap::new(),
        }
    }

    /// Returns `Some(regex)` for a pattern that compiles, `None` otherwise.
    /// Never panics, never propagates a compile error.
    pub fn get_or_compile(&mut self, pattern: &str) -> Option<Regex> {
        if let Some(entry) = self.compiled.get(pattern) {
            return entry.clone();
        }

        let compiled = Regex::new(pattern).ok();

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.compiled.remove(&oldest);
            }
        }
        self.order.push_back(pattern.to_string());
        self.compiled.insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_reuses_valid_pattern() {
        let mut cache = RegexCache::new(4);
        let re = cache.get_or_compile(r"^a\d+$").expect("valid pattern");
        assert!(re.is_match("a123"));
        assert!(cache.get_or_compile(r"^a\d+$").is_some());
    }

    #[test]
    fn malformed_pattern_caches_as_none_without_panicking() {
        let mut cache = RegexCache::new(4);
        assert!(cache.get_or_compile("(unclosed").is_none());
        assert!(cache.get_or_compile("(unclosed").is_none());
    }

    #[test]
    fn evicts_oldest_pattern_when_full() {
        let mut cache = RegexCache::new(1);
        cache.get_or_compile("a");
        cache.get_or_compile("b");
        assert_eq!(cache.compiled.len(), 1);
        assert!(!cache.compiled.contains_key("a"));
    }
}

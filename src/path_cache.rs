//! Bounded FIFO cache of parsed dotted field paths.
//!
//! The condition evaluator resolves paths like `user.profile.age` against a
//! JSON context on every leaf evaluation. Splitting the same string
//! repeatedly is wasted work, so parsed segment lists are memoized here.
//! Capacity is fixed at construction and eviction is strict FIFO (oldest
//! parsed path goes first), a bounded FIFO map of roughly 1,000 entries.

use std::collections::{HashMap, VecDeque};

pub struct PathCache {
    capacity: usize,
    order: VecDeque<String>,
    segments: HashMap<String, Vec<String>>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            segments: HashMap::new(),
        }
    }

    /// Returns the path's segments, parsing and memoizing on first use.
    pub fn segments(&mut self, path: &str) -> Vec<String> {
        if let Some(cached) = self.segments.get(path) {
            return cached.clone();
        }

        let parsed: Vec<String> = path.split('.').map(str::to_string).collect();

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.segments.remove(&oldest);
            }
        }
        self.order.push_back(path.to_string());
        self.segments.insert(path.to_string(), parsed.clone());
        parsed
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_paths() {
        let mut cache = PathCache::new(8);
        assert_eq!(cache.segments("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(cache.segments("single"), vec!["single"]);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = PathCache::new(2);
        cache.segments("a");
        cache.segments("b");
        cache.segments("c"); // evicts "a"
        assert_eq!(cache.len(), 2);
        assert!(!cache.segments.contains_key("a"));
        assert!(cache.segments.contains_key("b"));
        assert!(cache.segments.contains_key("c"));
    }

    #[test]
    fn reparsing_cached_path_does_not_change_size() {
        let mut cache = PathCache::new(2);
        cache.segments("a.b");
        cache.segments("a.b");
        assert_eq!(cache.len(), 1);
    }
}

//! Decision cache: an LRU with O(1) get/set/delete and precise,
//! prefix-keyed invalidation.
//!
//! The doubly-linked list that tracks recency is threaded through a slab
//! (`Vec<Option<Node>>`) addressed by index rather than built from
//! `Rc<RefCell<_>>` nodes — an arena, per the Design Notes' rule against
//! pointer-rich structures, even though this one isn't cyclic by
//! construction the way the role graph is.

use crate::decision::Decision;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

struct Node {
    key: String,
    decision: Decision,
    captured_at: DateTime<Utc>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// `userId | resource | action [| context-hash]`.
pub fn cache_key(user: &str, resource: &str, action: &str, context_hash: Option<&str>) -> String {
    match context_hash {
        Some(hash) if !hash.is_empty() => format!("{user}|{resource}|{action}|{hash}"),
        _ => format!("{user}|{resource}|{action}"),
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct DecisionCache {
    max_size: usize,
    ttl: Duration,
    slab: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    mru: Option<usize>,
    lru: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl DecisionCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            slab: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            mru: None,
            lru: None,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Decision> {
        let Some(&idx) = self.index.get(key) else {
            self.misses += 1;
            return None;
        };

        let captured_at = self.slab[idx].as_ref().unwrap().captured_at;
        if Utc::now().signed_duration_since(captured_at)
            > chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
        {
            self.remove_index(idx);
            self.misses += 1;
            return None;
        }

        self.touch(idx);
        self.hits += 1;
        Some(self.slab[idx].as_ref().unwrap().decision.clone())
    }

    pub fn set(&mut self, key: String, decision: Decision) {
        if let Some(&idx) = self.index.get(&key) {
            let node = self.slab[idx].as_mut().unwrap();
            node.decision = decision;
            node.captured_at = Utc::now();
            self.touch(idx);
            return;
        }

        if self.index.len() >= self.max_size {
            if let Some(lru_idx) = self.lru {
                self.remove_index(lru_idx);
                self.evictions += 1;
            }
        }

        let idx = self.alloc(Node {
            key: key.clone(),
            decision,
            captured_at: Utc::now(),
            prev: None,
            next: None,
        });
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(&idx) = self.index.get(key) {
            self.remove_index(idx);
        }
    }

    /// Drops every entry whose key begins with `prefix`, e.g. `"alice|"`.
    pub fn invalidate_prefix(&mut self, prefix: &str) {
        let victims: Vec<String> = self
            .index
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in victims {
            self.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.slab.clear();
        self.free.clear();
        self.index.clear();
        self.mru = None;
        self.lru = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.index.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slab[idx] = Some(node);
            idx
        } else {
            self.slab.push(Some(node));
            self.slab.len() - 1
        }
    }

    fn remove_index(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(node) = self.slab[idx].take() {
            self.index.remove(&node.key);
        }
        self.free.push(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slab[idx].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slab[p].as_mut().unwrap().next = next,
            None => self.mru = next,
        }
        match next {
            Some(n) => self.slab[n].as_mut().unwrap().prev = prev,
            None => self.lru = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_mru = self.mru;
        {
            let node = self.slab[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_mru;
        }
        if let Some(old) = old_mru {
            self.slab[old].as_mut().unwrap().prev = Some(idx);
        }
        self.mru = Some(idx);
        if self.lru.is_none() {
            self.lru = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.mru == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionSource;
    use std::thread::sleep;

    fn decision(allowed: bool) -> Decision {
        if allowed {
            Decision::allow(DecisionSource::Rbac).with_matched_role("x")
        } else {
            Decision::deny("no match", DecisionSource::Rbac)
        }
    }

    #[test]
    fn set_then_get_hits() {
        let mut cache = DecisionCache::new(10, Duration::from_secs(60));
        cache.set("alice|posts|read".into(), decision(true));
        assert!(cache.get("alice|posts|read").unwrap().allowed);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let mut cache = DecisionCache::new(10, Duration::from_secs(60));
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn lru_eviction_keeps_max_size_and_evicts_oldest() {
        let mut cache = DecisionCache::new(2, Duration::from_secs(60));
        cache.set("a".into(), decision(true));
        cache.set("b".into(), decision(true));
        cache.get("a"); // a is now MRU, b is LRU
        cache.set("c".into(), decision(true)); // evicts b
        assert_eq!(cache.stats().size, 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn ttl_expiry_evicts_on_read() {
        let mut cache = DecisionCache::new(10, Duration::from_millis(10));
        cache.set("a".into(), decision(true));
        sleep(Duration::from_millis(30));
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn prefix_invalidation_drops_only_matching_keys() {
        let mut cache = DecisionCache::new(10, Duration::from_secs(60));
        cache.set("alice|posts|read".into(), decision(true));
        cache.set("alice|posts|write".into(), decision(true));
        cache.set("bob|posts|read".into(), decision(true));

        cache.invalidate_prefix("alice|");

        assert!(cache.get("alice|posts|read").is_none());
        assert!(cache.get("alice|posts|write").is_none());
        assert!(cache.get("bob|posts|read").is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = DecisionCache::new(10, Duration::from_secs(60));
        cache.set("a".into(), decision(true));
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn cache_key_omits_hash_segment_when_absent() {
        assert_eq!(cache_key("alice", "posts", "read", None), "alice|posts|read");
        assert_eq!(
            cache_key("alice", "posts", "read", Some("abc123")),
            "alice|posts|read|abc123"
        );
    }
}

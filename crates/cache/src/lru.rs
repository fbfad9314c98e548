//! Minimal access-ordered queue used to pick an eviction victim.
//!
//! Not a generic LRU container: callers own the entry map and only ask
//! this queue "what's next to evict" and "record this key as touched".

use std::collections::VecDeque;
use std::hash::Hash;

pub struct LruQueue<K> {
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone> LruQueue<K> {
    pub fn new() -> Self {
        LruQueue {
            order: VecDeque::new(),
        }
    }

    /// Mark `key` as most-recently-used.
    pub fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }

    /// Remove `key` from the queue (on explicit invalidation).
    pub fn remove(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    /// Pop the least-recently-used key, if any.
    pub fn pop_lru(&mut self) -> Option<K> {
        self.order.pop_front()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl<K: Eq + Hash + Clone> Default for LruQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

//! Bitmap Cache (§4.3): a concurrent, byte-budgeted LRU in front of the
//! Bitmap Store, with single-flight coalescing of concurrent misses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use tagengine_core::{EngineResult, TagId, WorkspaceId};

use crate::lru::LruQueue;

type Key = (WorkspaceId, TagId);

/// A cached, decoded bitmap plus the store version it was read at.
pub struct CacheEntry {
    pub bitmap: RoaringBitmap,
    pub version: u64,
    pub bytes: usize,
}

impl CacheEntry {
    pub fn new(bitmap: RoaringBitmap, version: u64) -> Self {
        let bytes = bitmap.serialized_size();
        CacheEntry {
            bitmap,
            version,
            bytes,
        }
    }
}

/// Point-in-time cache occupancy, for `introspect`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

type InflightCell = Arc<OnceCell<Result<Arc<CacheEntry>, String>>>;

/// Decoded-bitmap cache, one instance shared by all workspaces opened by
/// an `Engine` (keys are workspace-scoped so this is safe).
pub struct BitmapCache {
    entries: DashMap<Key, Arc<CacheEntry>>,
    inflight: DashMap<Key, InflightCell>,
    order: Mutex<LruQueue<Key>>,
    bytes_used: AtomicUsize,
    byte_budget: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl BitmapCache {
    pub fn new(byte_budget: usize) -> Self {
        BitmapCache {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            order: Mutex::new(LruQueue::new()),
            bytes_used: AtomicUsize::new(0),
            byte_budget,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Fetch the cached bitmap for `key`, loading via `loader` on a miss.
    /// Concurrent misses for the same key coalesce onto one `loader`
    /// invocation.
    pub fn get_or_load<F>(&self, key: Key, loader: F) -> EngineResult<Arc<CacheEntry>>
    where
        F: FnOnce() -> EngineResult<(RoaringBitmap, u64)>,
    {
        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.order.lock().touch(&key);
            return Ok(entry.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| {
                loader()
                    .map(|(bitmap, version)| Arc::new(CacheEntry::new(bitmap, version)))
                    .map_err(|e| e.to_string())
            })
            .clone();

        // Only the thread that actually ran the loader (or the last one
        // to observe a stale cell) needs to clean up the inflight entry;
        // removing unconditionally is safe since `or_insert_with` above
        // would simply recreate it for the next miss.
        self.inflight.remove(&key);

        match result {
            Ok(entry) => {
                self.insert(key, entry.clone());
                Ok(entry)
            }
            Err(msg) => Err(tagengine_core::EngineError::unavailable(msg)),
        }
    }

    fn insert(&self, key: Key, entry: Arc<CacheEntry>) {
        self.bytes_used.fetch_add(entry.bytes, Ordering::Relaxed);
        self.entries.insert(key.clone(), entry);
        self.order.lock().touch(&key);
        self.evict_if_needed();
    }

    fn evict_if_needed(&self) {
        while self.bytes_used.load(Ordering::Relaxed) > self.byte_budget {
            let victim = { self.order.lock().pop_lru() };
            let Some(victim) = victim else { break };
            if let Some((_, entry)) = self.entries.remove(&victim) {
                self.bytes_used.fetch_sub(entry.bytes, Ordering::Relaxed);
                tracing::warn!(workspace = %victim.0, tag_id = %victim.1, "bitmap cache eviction under byte budget");
            }
        }
    }

    /// Drop a cached entry, e.g. after a mutation touches its tag.
    pub fn invalidate(&self, workspace: &WorkspaceId, tag_id: TagId) {
        let key = (workspace.clone(), tag_id);
        if let Some((_, entry)) = self.entries.remove(&key) {
            self.bytes_used.fetch_sub(entry.bytes, Ordering::Relaxed);
        }
        self.order.lock().remove(&key);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.bytes_used.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed) as u64,
            misses: self.misses.load(Ordering::Relaxed) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = BitmapCache::new(1 << 20);
        let ws = WorkspaceId::new("w1");
        let tag = TagId(1);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok((RoaringBitmap::from_sorted_iter([1, 2, 3]).unwrap(), 1))
        };
        let e1 = cache.get_or_load((ws.clone(), tag), load).unwrap();
        assert_eq!(e1.version, 1);
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.misses, 1);

        let e2 = cache
            .get_or_load((ws.clone(), tag), || panic!("should not reload on hit"))
            .unwrap();
        assert_eq!(e2.bitmap.len(), 3);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = BitmapCache::new(1 << 20);
        let ws = WorkspaceId::new("w1");
        let tag = TagId(1);
        cache
            .get_or_load((ws.clone(), tag), || {
                Ok((RoaringBitmap::from_sorted_iter([1]).unwrap(), 1))
            })
            .unwrap();
        cache.invalidate(&ws, tag);
        assert_eq!(cache.stats().entries, 0);
        let e = cache
            .get_or_load((ws.clone(), tag), || {
                Ok((RoaringBitmap::from_sorted_iter([1, 2]).unwrap(), 2))
            })
            .unwrap();
        assert_eq!(e.version, 2);
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let cache = BitmapCache::new(1); // budget so small every insert evicts
        let ws = WorkspaceId::new("w1");
        cache
            .get_or_load((ws.clone(), TagId(1)), || {
                Ok((RoaringBitmap::from_sorted_iter(0..1000).unwrap(), 1))
            })
            .unwrap();
        cache
            .get_or_load((ws.clone(), TagId(2)), || {
                Ok((RoaringBitmap::from_sorted_iter(0..1000).unwrap(), 1))
            })
            .unwrap();
        // The tiny budget forces eviction, so at most one entry survives.
        assert!(cache.stats().entries <= 1);
    }
}

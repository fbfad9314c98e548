//! Result Cache (§4.5): fingerprint-keyed cache of materialized query
//! results, invalidated by tag the moment any referenced bitmap version
//! is superseded.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tagengine_core::{EngineResult, Fingerprint, ResultSet, TagId, WorkspaceId};

use crate::lru::LruQueue;

type TagKey = (WorkspaceId, TagId);
type InflightCell = Arc<OnceCell<Result<Arc<ResultSet>, String>>>;

/// Fingerprint-keyed cache of `ResultSet`s, single-flighted per
/// fingerprint and invalidated per-tag.
pub struct ResultCache {
    entries: DashMap<Fingerprint, Arc<ResultSet>>,
    inflight: DashMap<Fingerprint, InflightCell>,
    tag_index: DashMap<TagKey, FxHashSet<Fingerprint>>,
    order: Mutex<LruQueue<Fingerprint>>,
    capacity: usize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        ResultCache {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            tag_index: DashMap::new(),
            order: Mutex::new(LruQueue::new()),
            capacity,
        }
    }

    /// A pure lookup, bypassing single-flight — used when the caller
    /// wants to know "hit or miss" without committing to a build.
    pub fn lookup(&self, fingerprint: Fingerprint) -> Option<Arc<ResultSet>> {
        let hit = self.entries.get(&fingerprint).map(|e| e.clone());
        if hit.is_some() {
            self.order.lock().touch(&fingerprint);
        }
        hit
    }

    /// Fetch-or-build a result set, coalescing concurrent builders of the
    /// same fingerprint. `referenced_tags` records which tags this
    /// fingerprint depends on, for later `invalidate_tag` calls.
    pub fn get_or_build<F>(
        &self,
        fingerprint: Fingerprint,
        workspace: &WorkspaceId,
        referenced_tags: &[TagId],
        builder: F,
    ) -> EngineResult<Arc<ResultSet>>
    where
        F: FnOnce() -> EngineResult<ResultSet>,
    {
        if let Some(hit) = self.lookup(fingerprint) {
            return Ok(hit);
        }

        let cell = self
            .inflight
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| builder().map(Arc::new).map_err(|e| e.to_string()))
            .clone();
        self.inflight.remove(&fingerprint);

        match result {
            Ok(result_set) => {
                self.insert(fingerprint, workspace, referenced_tags, result_set.clone());
                Ok(result_set)
            }
            Err(msg) => Err(tagengine_core::EngineError::unavailable(msg)),
        }
    }

    fn insert(
        &self,
        fingerprint: Fingerprint,
        workspace: &WorkspaceId,
        referenced_tags: &[TagId],
        result_set: Arc<ResultSet>,
    ) {
        self.entries.insert(fingerprint, result_set);
        self.order.lock().touch(&fingerprint);
        for &tag_id in referenced_tags {
            self.tag_index
                .entry((workspace.clone(), tag_id))
                .or_default()
                .insert(fingerprint);
        }
        self.evict_if_needed();
    }

    fn evict_if_needed(&self) {
        while self.entries.len() > self.capacity {
            let victim = { self.order.lock().pop_lru() };
            let Some(victim) = victim else { break };
            self.entries.remove(&victim);
        }
    }

    /// Drop every cached result that referenced `(workspace, tag_id)`.
    pub fn invalidate_tag(&self, workspace: &WorkspaceId, tag_id: TagId) {
        if let Some((_, fingerprints)) = self.tag_index.remove(&(workspace.clone(), tag_id)) {
            let mut order = self.order.lock();
            for fp in fingerprints {
                self.entries.remove(&fp);
                order.remove(&fp);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

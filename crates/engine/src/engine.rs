//! Multi-workspace orchestrator: the thing the `tagengine-api` facade
//! wraps in its `Engine`/`Handle` types (§6).

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex as PlMutex;
use rayon::ThreadPool;
use tagengine_cache::{BitmapCache, ResultCache};
use tagengine_core::{CardMutation, EngineError, EngineResult, QueryOptions, ResultSet, WorkspaceId};
use tagengine_storage::{workspace_dir_name, BitmapStore};

use crate::executor::Executor;
use crate::introspect::{Introspection, StoreStats};
use crate::resolve::{self, NameQuery};
use crate::workspace::WorkspaceState;
use crate::writer::{MutationPlan, Writer};

/// Owns the shared, cross-workspace resources — the store, the two
/// caches, and a dedicated thread pool — and lazily opens one
/// [`WorkspaceState`] per distinct `WorkspaceId` it sees.
pub struct WorkspaceEngine {
    store: Arc<dyn BitmapStore>,
    bitmap_cache: Arc<BitmapCache>,
    result_cache: Arc<ResultCache>,
    pool: ThreadPool,
    /// `None` for a purely in-memory engine (tests, embedding without a
    /// filesystem): catalogs are then never persisted across restarts.
    catalog_root: Option<PathBuf>,
    workspaces: DashMap<WorkspaceId, Arc<WorkspaceState>>,
    /// Coarse lock serializing first-open of a given workspace, so two
    /// concurrent callers never race `Catalog::open`'s append-log
    /// creation for the same directory.
    open_lock: PlMutex<()>,
}

impl WorkspaceEngine {
    pub fn new(
        store: Arc<dyn BitmapStore>,
        cache_bytes: usize,
        result_cache_entries: usize,
        threads: usize,
        catalog_root: Option<PathBuf>,
    ) -> EngineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| EngineError::unavailable(e.to_string()))?;
        Ok(WorkspaceEngine {
            store,
            bitmap_cache: Arc::new(BitmapCache::new(cache_bytes)),
            result_cache: Arc::new(ResultCache::new(result_cache_entries)),
            pool,
            catalog_root,
            workspaces: DashMap::new(),
            open_lock: PlMutex::new(()),
        })
    }

    fn catalog_dir(&self, workspace: &WorkspaceId) -> Option<PathBuf> {
        self.catalog_root
            .as_ref()
            .map(|root| root.join(workspace_dir_name(workspace)).join("catalog"))
    }

    /// Get-or-open the state for `workspace`, double-checked under
    /// `open_lock` so concurrent first-touches don't race catalog
    /// creation.
    pub fn workspace(&self, workspace: &WorkspaceId) -> EngineResult<Arc<WorkspaceState>> {
        if let Some(state) = self.workspaces.get(workspace) {
            return Ok(state.clone());
        }
        let _guard = self.open_lock.lock();
        if let Some(state) = self.workspaces.get(workspace) {
            return Ok(state.clone());
        }
        let state = Arc::new(WorkspaceState::open(
            self.store.as_ref(),
            workspace,
            self.catalog_dir(workspace),
        )?);
        self.workspaces.insert(workspace.clone(), state.clone());
        Ok(state)
    }

    /// Resolve `names` and run the eight-step query algorithm (§4.4)
    /// against `workspace`.
    pub fn query(
        &self,
        workspace: &WorkspaceId,
        names: &NameQuery,
        options: &QueryOptions,
    ) -> EngineResult<ResultSet> {
        let state = self.workspace(workspace)?;
        let resolved = resolve::resolve(&state.catalog, names);
        let executor = Executor {
            store: self.store.as_ref(),
            bitmap_cache: &self.bitmap_cache,
            result_cache: &self.result_cache,
            catalog: &state.catalog,
            pool: &self.pool,
        };
        executor.execute(workspace, &resolved, options)
    }

    /// Apply a mutation batch under `workspace`'s exclusive write lock
    /// (§4.5, §5).
    pub fn ingest_batch(
        &self,
        workspace: &WorkspaceId,
        mutations: &[CardMutation],
    ) -> EngineResult<()> {
        let state = self.workspace(workspace)?;
        let _guard = state.write_lock.lock();
        let writer = Writer {
            store: self.store.as_ref(),
            catalog: &state.catalog,
            card_tags: &state.card_tags,
            bitmap_cache: &self.bitmap_cache,
            result_cache: &self.result_cache,
        };
        writer.apply_batch(workspace, mutations)
    }

    /// Preview a mutation batch (§9's "plan then commit" workflow)
    /// without touching any bitmap. Acquires and releases `workspace`'s
    /// write lock for the duration of the diff only — unlike
    /// `ingest_batch`, the lock is not held across the caller's
    /// confirmation step, so a plan may be stale by the time it reaches
    /// `apply_plan` if another mutation lands in between; `apply_plan`
    /// re-diffs nothing and simply applies the plan's bit changes as
    /// recorded.
    pub fn plan_mutations(
        &self,
        workspace: &WorkspaceId,
        mutations: &[CardMutation],
    ) -> EngineResult<MutationPlan> {
        let state = self.workspace(workspace)?;
        let _guard = state.write_lock.lock();
        let writer = Writer {
            store: self.store.as_ref(),
            catalog: &state.catalog,
            card_tags: &state.card_tags,
            bitmap_cache: &self.bitmap_cache,
            result_cache: &self.result_cache,
        };
        writer.plan(mutations)
    }

    /// Commit a plan previously returned by [`WorkspaceEngine::plan_mutations`].
    pub fn apply_plan(
        &self,
        workspace: &WorkspaceId,
        plan: &MutationPlan,
    ) -> EngineResult<()> {
        let state = self.workspace(workspace)?;
        let _guard = state.write_lock.lock();
        let writer = Writer {
            store: self.store.as_ref(),
            catalog: &state.catalog,
            card_tags: &state.card_tags,
            bitmap_cache: &self.bitmap_cache,
            result_cache: &self.result_cache,
        };
        writer.apply(workspace, plan)
    }

    /// `{ tag_count, card_count, cache_stats, store_stats }` (§6).
    pub fn introspect(&self, workspace: &WorkspaceId) -> EngineResult<Introspection> {
        let state = self.workspace(workspace)?;
        let tag_ids = self.store.scan_tags(workspace)?;
        let mut total_cardinality = 0u64;
        for &tag_id in &tag_ids {
            if let Some(record) = self.store.try_get(workspace, tag_id)? {
                total_cardinality += record.cardinality;
            }
        }
        Ok(Introspection {
            tag_count: state.catalog.tag_count(),
            card_count: state.catalog.card_count(),
            bitmap_cache_stats: self.bitmap_cache.stats(),
            result_cache_entries: self.result_cache.len(),
            store_stats: StoreStats {
                tag_count: tag_ids.len(),
                total_cardinality,
            },
        })
    }

    /// Admin purge (§6): drop all durable and resident state for
    /// `workspace`. Idempotent on an already-purged workspace.
    pub fn purge(&self, workspace: &WorkspaceId) -> EngineResult<()> {
        self.store.purge(workspace)?;
        self.workspaces.remove(workspace);
        if let Some(dir) = self.catalog_dir(workspace) {
            if let Some(workspace_root) = dir.parent() {
                if workspace_root.exists() {
                    std::fs::remove_dir_all(workspace_root)
                        .map_err(|e| EngineError::unavailable(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// Reconstructs bitmaps from the catalog's notion of truth (§6's
    /// `rebuild-index`): every tag bitmap is pruned to positions the
    /// catalog still considers live, the reserved `Live_W` file is
    /// rewritten from `catalog.live_bitmap()`, and the in-memory
    /// `CardTagIndex` is rebuilt from the repaired bitmaps. Used to
    /// recover a workspace the store has flagged `Corrupt` (§7).
    pub fn rebuild_index(&self, workspace: &WorkspaceId) -> EngineResult<()> {
        let state = self.workspace(workspace)?;
        let live = state.catalog.live_bitmap();

        for tag_id in self.store.scan_tags(workspace)? {
            if let Some(record) = self.store.try_get(workspace, tag_id)? {
                let repaired = &record.bitmap & &live;
                if repaired.len() != record.bitmap.len() {
                    self.store.put(workspace, tag_id, &repaired, record.version + 1)?;
                }
            }
        }
        self.store.put(
            workspace,
            tagengine_core::LIVE_TAG_ID,
            &live,
            state.catalog.live_version() + 1,
        )?;

        state.card_tags.reset(self.store.as_ref(), workspace)?;
        for tag_id in self.store.scan_tags(workspace)? {
            self.bitmap_cache.invalidate(workspace, tag_id);
            self.result_cache.invalidate_tag(workspace, tag_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagengine_core::{CardExtId, TagExtId};
    use tagengine_storage::MemBitmapStore;

    fn engine() -> WorkspaceEngine {
        WorkspaceEngine::new(Arc::new(MemBitmapStore::new()), 1 << 20, 64, 2, None).unwrap()
    }

    #[test]
    fn ingest_then_query_round_trips() {
        let engine = engine();
        let ws = WorkspaceId::new("w1");
        engine
            .ingest_batch(
                &ws,
                &[CardMutation::UpsertCard {
                    card_ext_id: CardExtId::new("c1"),
                    tags: vec![TagExtId::new("red")],
                }],
            )
            .unwrap();

        let names = NameQuery {
            intersection: vec![TagExtId::new("red")],
            ..Default::default()
        };
        let result = engine.query(&ws, &names, &QueryOptions::default()).unwrap();
        assert_eq!(result.ids, vec![CardExtId::new("c1")]);
    }

    #[test]
    fn introspect_reports_tag_and_card_counts() {
        let engine = engine();
        let ws = WorkspaceId::new("w1");
        engine
            .ingest_batch(
                &ws,
                &[CardMutation::UpsertCard {
                    card_ext_id: CardExtId::new("c1"),
                    tags: vec![TagExtId::new("red"), TagExtId::new("blue")],
                }],
            )
            .unwrap();
        let report = engine.introspect(&ws).unwrap();
        assert_eq!(report.card_count, 1);
        assert_eq!(report.tag_count, 2);
        assert_eq!(report.store_stats.tag_count, 2);
    }

    #[test]
    fn purge_drops_workspace_state() {
        let engine = engine();
        let ws = WorkspaceId::new("w1");
        engine
            .ingest_batch(
                &ws,
                &[CardMutation::UpsertCard {
                    card_ext_id: CardExtId::new("c1"),
                    tags: vec![TagExtId::new("red")],
                }],
            )
            .unwrap();
        engine.purge(&ws).unwrap();
        let report = engine.introspect(&ws).unwrap();
        assert_eq!(report.card_count, 0);
    }
}

//! `open_workspace(W, config) -> Handle` / `close_handle(Handle)` (§6).

use std::sync::Arc;

use tagengine_core::{CardMutation, EngineResult, QueryOptions, ResultSet, WorkspaceId};
use tagengine_engine::{Introspection, MutationPlan, NameQuery, WorkspaceEngine};
use tagengine_storage::{BitmapStore, FileBitmapStore, MemBitmapStore};

use crate::config::Config;

/// Owns the shared store and caches and lazily opens workspaces on
/// first touch. Cheap to clone (an `Arc` around the real state); most
/// embeddings hold one `Engine` for the process lifetime and call
/// [`Engine::open_workspace`] per logical tenant.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<WorkspaceEngine>,
}

impl Engine {
    /// Open the engine with `config`. A `data_dir` of `None` opens a
    /// purely in-memory store; callers that want §6's environment
    /// fallback should pass `Config::from_env()`.
    pub fn open(config: Config) -> EngineResult<Self> {
        let (store, catalog_root): (Arc<dyn BitmapStore>, Option<std::path::PathBuf>) =
            match &config.data_dir {
                Some(dir) => {
                    let store = FileBitmapStore::open(dir.join("bitmaps"))
                        .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
                    (Arc::new(store), Some(dir.join("workspaces")))
                }
                None => (Arc::new(MemBitmapStore::new()), None),
            };
        let inner = WorkspaceEngine::new(
            store,
            config.cache_bytes,
            config.result_cache_entries,
            config.threads,
            catalog_root,
        )?;
        Ok(Engine {
            inner: Arc::new(inner),
        })
    }

    /// `open_workspace(W, config) -> Handle` (§6). Idempotent: repeated
    /// calls for the same `workspace` share the same underlying state.
    pub fn open_workspace(&self, workspace: impl Into<WorkspaceId>) -> EngineResult<Handle> {
        let workspace = workspace.into();
        // Touch it now so callers get `NotFound`/`Unavailable` at open
        // time rather than on the first query.
        self.inner.workspace(&workspace)?;
        Ok(Handle {
            engine: self.inner.clone(),
            workspace,
        })
    }

    /// Admin purge (§6): drop all durable and resident state for
    /// `workspace`, whether or not a [`Handle`] is currently open on it.
    pub fn purge(&self, workspace: &WorkspaceId) -> EngineResult<()> {
        self.inner.purge(workspace)
    }
}

/// A workspace-scoped session. Cheap to clone; every clone shares the
/// same underlying [`Engine`] state. `close_handle` (§6) has no
/// explicit resource to release beyond normal drop, but [`Handle::close`]
/// is provided for callers that want the contract spelled out at the
/// call site.
#[derive(Clone)]
pub struct Handle {
    engine: Arc<WorkspaceEngine>,
    workspace: WorkspaceId,
}

impl Handle {
    /// The workspace this handle is scoped to.
    pub fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    /// `ingest_batch(Handle, [CardMutation]) -> Ack | Error` (§6).
    pub fn ingest_batch(&self, mutations: &[CardMutation]) -> EngineResult<()> {
        self.engine.ingest_batch(&self.workspace, mutations)
    }

    /// `query(Handle, Query, options) -> ResultSet | Error` (§6). `names`
    /// carries external tag names (`I`, `O`, `X`, `limit`); resolution
    /// against this workspace's catalog happens inside the engine.
    pub fn query(&self, names: &NameQuery, options: &QueryOptions) -> EngineResult<ResultSet> {
        self.engine.query(&self.workspace, names, options)
    }

    /// Preview `mutations` (§9) without committing any bitmap change;
    /// pass the result to [`Handle::apply_plan`] to commit it.
    pub fn plan_mutations(&self, mutations: &[CardMutation]) -> EngineResult<MutationPlan> {
        self.engine.plan_mutations(&self.workspace, mutations)
    }

    /// Commit a plan previously returned by [`Handle::plan_mutations`].
    pub fn apply_plan(&self, plan: &MutationPlan) -> EngineResult<()> {
        self.engine.apply_plan(&self.workspace, plan)
    }

    /// `introspect(Handle) -> { tag_count, card_count, cache_stats,
    /// store_stats }` (§6).
    pub fn introspect(&self) -> EngineResult<Introspection> {
        self.engine.introspect(&self.workspace)
    }

    /// `engine rebuild-index --workspace W` (§6): reconstructs bitmaps
    /// from the catalog's notion of truth. Used to recover a workspace
    /// the store has flagged `Corrupt` (§7).
    pub fn rebuild_index(&self) -> EngineResult<()> {
        self.engine.rebuild_index(&self.workspace)
    }

    /// Admin purge of this handle's own workspace; equivalent to
    /// `Engine::purge(&self.workspace)`.
    pub fn purge(&self) -> EngineResult<()> {
        self.engine.purge(&self.workspace)
    }

    /// `close_handle(Handle)` (§6). Consumes the handle; there is no
    /// resource beyond the shared `Arc` to release, so this is
    /// equivalent to dropping it.
    pub fn close(self) {}
}

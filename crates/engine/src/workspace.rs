//! Per-workspace state: one [`Catalog`], its derived [`CardTagIndex`],
//! and the exclusive write lock the Writer runs under (§5: "one logical
//! writer per workspace; any number of concurrent readers").

use std::path::PathBuf;

use parking_lot::Mutex;
use tagengine_catalog::Catalog;
use tagengine_core::{EngineResult, WorkspaceId};
use tagengine_storage::BitmapStore;

use crate::card_tags::CardTagIndex;

/// Everything scoped to one open workspace. Long-lived; held by the
/// [`crate::engine::WorkspaceEngine`] in a `DashMap` keyed by
/// `WorkspaceId`.
pub struct WorkspaceState {
    pub catalog: Catalog,
    pub card_tags: CardTagIndex,
    /// Held for the duration of one `ingest_batch` call. Readers never
    /// take this lock (§5).
    pub write_lock: Mutex<()>,
}

impl WorkspaceState {
    /// Open (or create) the catalog rooted at `catalog_dir` and rebuild
    /// the card-tag auxiliary index by scanning `store`. `catalog_dir =
    /// None` opens a purely in-memory catalog (tests, ephemeral
    /// embedding).
    pub fn open(
        store: &dyn BitmapStore,
        workspace: &WorkspaceId,
        catalog_dir: Option<PathBuf>,
    ) -> EngineResult<Self> {
        let catalog = match catalog_dir {
            Some(dir) => Catalog::open(dir)?,
            None => Catalog::in_memory(),
        };
        let card_tags = CardTagIndex::rebuild(store, workspace)?;
        Ok(WorkspaceState {
            catalog,
            card_tags,
            write_lock: Mutex::new(()),
        })
    }
}

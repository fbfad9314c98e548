//! Per-card tag-set auxiliary (§4.5): lets `delete_card` clear a
//! tombstoned card's bit from every bitmap that contains it without
//! scanning every bitmap in the workspace.

use dashmap::DashMap;
use rustc_hash::FxHashSet;
use tagengine_core::{EngineResult, Position, TagId, WorkspaceId};
use tagengine_storage::BitmapStore;

/// `position -> current tag assignment`, kept in sync by the Writer on
/// every `upsert_card`/`delete_card`.
pub struct CardTagIndex {
    assignments: DashMap<Position, FxHashSet<TagId>>,
}

impl CardTagIndex {
    pub fn new() -> Self {
        CardTagIndex {
            assignments: DashMap::new(),
        }
    }

    /// Reconstruct the index by scanning every tag bitmap once. Paid at
    /// workspace-open time (or `rebuild-index`), never per-mutation.
    pub fn rebuild(store: &dyn BitmapStore, workspace: &WorkspaceId) -> EngineResult<Self> {
        let index = Self::new();
        index.populate(store, workspace)?;
        Ok(index)
    }

    /// Re-derive this index's contents from `store` in place, discarding
    /// whatever it held before. Used by `rebuild-index` after bitmaps
    /// have been repaired against the catalog, where the engine already
    /// holds a shared reference to the live `CardTagIndex` and cannot
    /// swap it for a freshly built one.
    pub fn reset(&self, store: &dyn BitmapStore, workspace: &WorkspaceId) -> EngineResult<()> {
        self.assignments.clear();
        self.populate(store, workspace)
    }

    fn populate(&self, store: &dyn BitmapStore, workspace: &WorkspaceId) -> EngineResult<()> {
        for tag_id in store.scan_tags(workspace)? {
            if let Some(record) = store.try_get(workspace, tag_id)? {
                for pos in record.bitmap.iter() {
                    self.assignments
                        .entry(Position(pos))
                        .or_default()
                        .insert(tag_id);
                }
            }
        }
        Ok(())
    }

    /// Current tag set for `position`, empty if untracked.
    pub fn tags_of(&self, position: Position) -> FxHashSet<TagId> {
        self.assignments
            .get(&position)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Overwrite `position`'s tag assignment, e.g. after an `upsert_card`
    /// diff has been applied to the underlying bitmaps.
    pub fn set_tags(&self, position: Position, tags: FxHashSet<TagId>) {
        if tags.is_empty() {
            self.assignments.remove(&position);
        } else {
            self.assignments.insert(position, tags);
        }
    }

    /// Drop and return `position`'s tag assignment, e.g. on `delete_card`.
    pub fn clear(&self, position: Position) -> FxHashSet<TagId> {
        self.assignments
            .remove(&position)
            .map(|(_, tags)| tags)
            .unwrap_or_default()
    }

    /// Drop any record of `tag_id` entirely, e.g. on `delete_tag`.
    pub fn forget_tag(&self, tag_id: TagId) {
        for mut entry in self.assignments.iter_mut() {
            entry.value_mut().remove(&tag_id);
        }
    }
}

impl Default for CardTagIndex {
    fn default() -> Self {
        Self::new()
    }
}

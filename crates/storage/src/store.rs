use roaring::RoaringBitmap;
use tagengine_core::{EngineError, EngineResult, TagId, WorkspaceId};

/// A decoded bitmap together with the header fields a caller needs to
/// make selectivity and CAS decisions without re-decoding.
#[derive(Debug, Clone)]
pub struct BitmapRecord {
    /// The decoded set of positions.
    pub bitmap: RoaringBitmap,
    /// Version at the time of this read.
    pub version: u64,
    /// `|bitmap|`, equal to the header's `cardinality` field (§3).
    pub cardinality: u64,
}

/// The Bitmap Store contract (§4.1).
///
/// Implementations durably persist one compressed bitmap per
/// `(workspace_id, tag_id)`. Writes are durable before `put` returns;
/// concurrent readers always observe a consistent `(bytes, version)`
/// pair; no partial writes are ever visible.
pub trait BitmapStore: Send + Sync {
    /// Atomically write `bitmap` for `(workspace, tag_id)`, unconditionally
    /// (create, or blind overwrite), stamping it with `new_version`. There
    /// is no compare-and-swap here — version-gated writes that must fail
    /// on a stale observed version go through
    /// [`BitmapStore::compare_and_swap`] instead (§4.5, §7 —
    /// `StaleVersion` never crosses the public API).
    fn put(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        new_version: u64,
    ) -> EngineResult<()>;

    /// Optimistic compare-and-swap write. Returns `Ok(false)` (not an
    /// error) when the observed version has moved on, so the Writer can
    /// decide whether to retry (§4.5, §7 — `StaleVersion` never crosses
    /// the public API).
    fn compare_and_swap(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        expected_version: Option<u64>,
        new_version: u64,
    ) -> EngineResult<bool>;

    /// Point read. `Err(EngineError::NotFound)` if absent.
    fn get(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<BitmapRecord>;

    /// Like [`BitmapStore::get`] but returns `Ok(None)` instead of
    /// `NotFound` — used by the planner, which treats an absent tag as
    /// contributing the empty set rather than as an error (§4.4 step 1).
    fn try_get(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<Option<BitmapRecord>> {
        match self.get(workspace, tag_id) {
            Ok(record) => Ok(Some(record)),
            Err(EngineError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All tag ids present in `workspace` (does not include the reserved
    /// `Live_W` bitmap).
    fn scan_tags(&self, workspace: &WorkspaceId) -> EngineResult<Vec<TagId>>;

    /// Remove the bitmap and header for `(workspace, tag_id)`.
    fn delete(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<()>;

    /// Remove all state for `workspace` (admin purge, §6).
    fn purge(&self, workspace: &WorkspaceId) -> EngineResult<()>;
}

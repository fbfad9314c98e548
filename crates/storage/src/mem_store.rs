use crate::store::{BitmapRecord, BitmapStore};
use dashmap::DashMap;
use roaring::RoaringBitmap;
use std::time::{SystemTime, UNIX_EPOCH};
use tagengine_core::{EngineError, EngineResult, TagId, WorkspaceId};

#[derive(Clone)]
struct Entry {
    bitmap: RoaringBitmap,
    version: u64,
    #[allow(dead_code)]
    updated_at: i64,
}

/// In-memory [`BitmapStore`], backed by a [`DashMap`]. Used by tests and
/// by callers embedding the engine without a filesystem. Durability
/// guarantees ("written before `put` returns") are trivially satisfied —
/// the data never leaves process memory.
#[derive(Default)]
pub struct MemBitmapStore {
    entries: DashMap<(WorkspaceId, TagId), Entry>,
}

impl MemBitmapStore {
    /// An empty store.
    pub fn new() -> Self {
        MemBitmapStore {
            entries: DashMap::new(),
        }
    }
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

impl BitmapStore for MemBitmapStore {
    fn put(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        new_version: u64,
    ) -> EngineResult<()> {
        self.entries.insert(
            (workspace.clone(), tag_id),
            Entry {
                bitmap: bitmap.clone(),
                version: new_version,
                updated_at: now_micros(),
            },
        );
        Ok(())
    }

    fn compare_and_swap(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        expected_version: Option<u64>,
        new_version: u64,
    ) -> EngineResult<bool> {
        let key = (workspace.clone(), tag_id);
        match self.entries.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occ) => {
                if expected_version.is_some_and(|v| v != occ.get().version) {
                    return Ok(false);
                }
                occ.insert(Entry {
                    bitmap: bitmap.clone(),
                    version: new_version,
                    updated_at: now_micros(),
                });
                Ok(true)
            }
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                if expected_version.is_some() {
                    return Ok(false);
                }
                vac.insert(Entry {
                    bitmap: bitmap.clone(),
                    version: new_version,
                    updated_at: now_micros(),
                });
                Ok(true)
            }
        }
    }

    fn get(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<BitmapRecord> {
        self.entries
            .get(&(workspace.clone(), tag_id))
            .map(|e| BitmapRecord {
                bitmap: e.bitmap.clone(),
                version: e.version,
                cardinality: e.bitmap.len(),
            })
            .ok_or_else(|| EngineError::not_found(format!("tag {tag_id} in workspace {workspace}")))
    }

    fn scan_tags(&self, workspace: &WorkspaceId) -> EngineResult<Vec<TagId>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| &e.key().0 == workspace)
            .map(|e| e.key().1)
            .collect())
    }

    fn delete(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<()> {
        self.entries.remove(&(workspace.clone(), tag_id));
        Ok(())
    }

    fn purge(&self, workspace: &WorkspaceId) -> EngineResult<()> {
        self.entries.retain(|k, _| &k.0 != workspace);
        Ok(())
    }
}

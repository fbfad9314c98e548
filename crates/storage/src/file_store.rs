//! Filesystem-backed [`BitmapStore`].
//!
//! Layout under `data_dir` (§6 persisted state layout):
//!
//! ```text
//! <data_dir>/<workspace>/bitmaps/<tag_id>.bmp
//! <data_dir>/<workspace>/live.bmp
//! ```
//!
//! Each file is [`crate::header::HEADER_SIZE`] header bytes followed by
//! `RoaringBitmap::serialize_into` bytes. Writes go to a sibling temp
//! file and are renamed into place — the same write-temp-then-rename
//! idiom the teacher's storage/durability layers use everywhere a file
//! must never be observed half-written.

use crate::header::{BitmapHeader, HEADER_SIZE};
use crate::store::{BitmapRecord, BitmapStore};
use dashmap::DashMap;
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tagengine_core::{EngineError, EngineResult, TagId, WorkspaceId, LIVE_TAG_ID};

/// [`BitmapStore`] persisted as one file per `(workspace, tag_id)` under
/// a root data directory.
pub struct FileBitmapStore {
    data_dir: PathBuf,
    /// Per-key write lock, so `compare_and_swap`'s read-modify-write
    /// window is atomic even across threads racing the same tag.
    locks: DashMap<(WorkspaceId, TagId), Arc<Mutex<()>>>,
}

impl FileBitmapStore {
    /// Open (creating if absent) a file-backed store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(FileBitmapStore {
            data_dir,
            locks: DashMap::new(),
        })
    }

    fn workspace_dir(&self, workspace: &WorkspaceId) -> PathBuf {
        self.data_dir.join(sanitize(workspace.as_str()))
    }

    fn tag_path(&self, workspace: &WorkspaceId, tag_id: TagId) -> PathBuf {
        if tag_id == LIVE_TAG_ID {
            self.workspace_dir(workspace).join("live.bmp")
        } else {
            self.workspace_dir(workspace)
                .join("bitmaps")
                .join(format!("{}.bmp", tag_id.value()))
        }
    }

    fn lock_for(&self, workspace: &WorkspaceId, tag_id: TagId) -> Arc<Mutex<()>> {
        self.locks
            .entry((workspace.clone(), tag_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_file(path: &Path) -> io::Result<(BitmapHeader, RoaringBitmap)> {
        let mut f = fs::File::open(path)?;
        let mut header_buf = [0u8; HEADER_SIZE];
        f.read_exact(&mut header_buf)?;
        let header = BitmapHeader::read_from(&header_buf[..])?;
        let mut rest = Vec::new();
        f.read_to_end(&mut rest)?;
        let bitmap = RoaringBitmap::deserialize_from(&rest[..])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((header, bitmap))
    }

    fn write_file_atomic(path: &Path, header: &BitmapHeader, bitmap: &RoaringBitmap) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("bmp.tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            header.write_to(&mut tmp)?;
            let mut body = Vec::new();
            bitmap.serialize_into(&mut body)?;
            tmp.write_all(&body)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Filesystem-safe directory name for `workspace`, matching the
/// sanitization [`FileBitmapStore`] applies to its own workspace
/// subdirectory — callers that lay out sibling state (e.g. the catalog
/// logs) alongside `bitmaps/`/`live.bmp` must use the same name.
pub fn workspace_dir_name(workspace: &WorkspaceId) -> String {
    sanitize(workspace.as_str())
}

fn sanitize(workspace: &str) -> String {
    workspace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn io_err_to_engine(e: io::Error, workspace: &WorkspaceId, tag_id: TagId) -> EngineError {
    if e.kind() == io::ErrorKind::NotFound {
        EngineError::not_found(format!("tag {tag_id} in workspace {workspace}"))
    } else if e.kind() == io::ErrorKind::InvalidData {
        EngineError::corrupt(format!("{workspace}/{tag_id}: {e}"))
    } else {
        EngineError::unavailable(e.to_string())
    }
}

impl BitmapStore for FileBitmapStore {
    fn put(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        new_version: u64,
    ) -> EngineResult<()> {
        let lock = self.lock_for(workspace, tag_id);
        let _guard = lock.lock();
        let header = BitmapHeader::new(bitmap.len(), new_version, now_micros());
        let path = self.tag_path(workspace, tag_id);
        Self::write_file_atomic(&path, &header, bitmap)
            .map_err(|e| io_err_to_engine(e, workspace, tag_id))
    }

    fn compare_and_swap(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        bitmap: &RoaringBitmap,
        expected_version: Option<u64>,
        new_version: u64,
    ) -> EngineResult<bool> {
        let lock = self.lock_for(workspace, tag_id);
        let _guard = lock.lock();
        let path = self.tag_path(workspace, tag_id);
        let current_version = match Self::read_file(&path) {
            Ok((header, _)) => Some(header.version),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err_to_engine(e, workspace, tag_id)),
        };
        if expected_version != current_version {
            return Ok(false);
        }
        let header = BitmapHeader::new(bitmap.len(), new_version, now_micros());
        Self::write_file_atomic(&path, &header, bitmap)
            .map_err(|e| io_err_to_engine(e, workspace, tag_id))?;
        Ok(true)
    }

    fn get(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<BitmapRecord> {
        let path = self.tag_path(workspace, tag_id);
        let (header, bitmap) =
            Self::read_file(&path).map_err(|e| io_err_to_engine(e, workspace, tag_id))?;
        Ok(BitmapRecord {
            bitmap,
            version: header.version,
            cardinality: header.cardinality,
        })
    }

    fn scan_tags(&self, workspace: &WorkspaceId) -> EngineResult<Vec<TagId>> {
        let dir = self.workspace_dir(workspace).join("bitmaps");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut tags = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| EngineError::unavailable(e.to_string()))? {
            let entry = entry.map_err(|e| EngineError::unavailable(e.to_string()))?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = stem.parse::<u32>() {
                    tags.push(TagId(id));
                }
            }
        }
        Ok(tags)
    }

    fn delete(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<()> {
        let path = self.tag_path(workspace, tag_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::unavailable(e.to_string())),
        }
    }

    fn purge(&self, workspace: &WorkspaceId) -> EngineResult<()> {
        let dir = self.workspace_dir(workspace);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| EngineError::unavailable(e.to_string()))?;
        }
        self.locks.retain(|k, _| &k.0 != workspace);
        Ok(())
    }
}

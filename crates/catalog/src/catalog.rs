use crate::log::AppendLog;
use crate::record::{CardRecord, TagRecord};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tagengine_core::{CardExtId, EngineResult, Position, TagExtId, TagId, TagType};

#[derive(Clone)]
struct CardEntry {
    ext_id: CardExtId,
    live: bool,
}

/// The Tag/Card Catalog (§4.2): bijection between external opaque ids
/// and dense internal positions/tag ids, scoped to a single workspace.
/// Callers (the engine crate) keep one `Catalog` per open workspace.
pub struct Catalog {
    cards_by_ext: DashMap<CardExtId, Position>,
    cards_by_pos: DashMap<Position, CardEntry>,
    tags_by_ext: DashMap<TagExtId, TagId>,
    tags_by_id: DashMap<TagId, (TagExtId, TagType)>,
    live: RwLock<RoaringBitmap>,
    live_version: AtomicU64,
    next_position: Mutex<u32>,
    next_tag_id: Mutex<u32>,
    card_log: Option<AppendLog>,
    tag_log: Option<AppendLog>,
}

impl Catalog {
    /// A fresh, empty, purely in-memory catalog — no persistence.
    pub fn in_memory() -> Self {
        Catalog {
            cards_by_ext: DashMap::new(),
            cards_by_pos: DashMap::new(),
            tags_by_ext: DashMap::new(),
            tags_by_id: DashMap::new(),
            live: RwLock::new(RoaringBitmap::new()),
            live_version: AtomicU64::new(0),
            next_position: Mutex::new(0),
            next_tag_id: Mutex::new(0),
            card_log: None,
            tag_log: None,
        }
    }

    /// Open (and replay) a persistent catalog rooted at `dir`, which
    /// holds the `cards` and `tags` append-only logs (§6).
    pub fn open(dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let dir = dir.into();
        let card_log_path = dir.join("cards");
        let tag_log_path = dir.join("tags");
        let card_log = AppendLog::open(&card_log_path)
            .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
        let tag_log = AppendLog::open(&tag_log_path)
            .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;

        let catalog = Catalog {
            cards_by_ext: DashMap::new(),
            cards_by_pos: DashMap::new(),
            tags_by_ext: DashMap::new(),
            tags_by_id: DashMap::new(),
            live: RwLock::new(RoaringBitmap::new()),
            live_version: AtomicU64::new(0),
            next_position: Mutex::new(0),
            next_tag_id: Mutex::new(0),
            card_log: Some(card_log),
            tag_log: Some(tag_log),
        };

        catalog.replay_cards(&card_log_path)?;
        catalog.replay_tags(&tag_log_path)?;
        Ok(catalog)
    }

    fn replay_cards(&self, path: &std::path::Path) -> EngineResult<()> {
        let raw = AppendLog::replay(path)
            .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
        let mut max_pos: Option<u32> = None;
        for bytes in raw {
            let record: CardRecord = bincode::deserialize(&bytes)
                .map_err(|e| tagengine_core::EngineError::corrupt(e.to_string()))?;
            let position = Position(record.position);
            let ext_id = CardExtId::new(record.card_ext_id);
            self.cards_by_ext.insert(ext_id.clone(), position);
            self.cards_by_pos.insert(
                position,
                CardEntry {
                    ext_id,
                    live: record.live,
                },
            );
            if record.live {
                self.live.write().insert(position.value());
            } else {
                self.live.write().remove(position.value());
            }
            self.live_version.fetch_add(1, Ordering::Relaxed);
            max_pos = Some(max_pos.map_or(record.position, |m| m.max(record.position)));
        }
        if let Some(m) = max_pos {
            *self.next_position.lock() = m + 1;
        }
        Ok(())
    }

    fn replay_tags(&self, path: &std::path::Path) -> EngineResult<()> {
        let raw = AppendLog::replay(path)
            .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
        let mut max_id: Option<u32> = None;
        for bytes in raw {
            let record: TagRecord = bincode::deserialize(&bytes)
                .map_err(|e| tagengine_core::EngineError::corrupt(e.to_string()))?;
            let tag_id = TagId(record.tag_id);
            let ext_id = TagExtId::new(record.tag_ext_name);
            let tag_type = decode_tag_type(record.tag_type);
            // A later record for the same `tag_id` under a different name
            // is a rename (§4.5): drop the stale forward mapping so the
            // old name no longer resolves.
            if let Some(prior) = self.tags_by_id.get(&tag_id) {
                if prior.0 != ext_id {
                    self.tags_by_ext.remove(&prior.0);
                }
            }
            if record.deleted {
                self.tags_by_ext.remove(&ext_id);
                self.tags_by_id.remove(&tag_id);
            } else {
                self.tags_by_ext.insert(ext_id.clone(), tag_id);
                self.tags_by_id.insert(tag_id, (ext_id, tag_type));
            }
            max_id = Some(max_id.map_or(record.tag_id, |m| m.max(record.tag_id)));
        }
        if let Some(m) = max_id {
            *self.next_tag_id.lock() = m + 1;
        }
        Ok(())
    }

    /// Idempotent: returns the existing position if `card_ext_id` was
    /// already seen (reviving it if it had been tombstoned), else
    /// allocates the next monotonic position (§4.2).
    pub fn intern_card(&self, card_ext_id: &CardExtId) -> EngineResult<Position> {
        if let Some(existing) = self.cards_by_ext.get(card_ext_id) {
            let position = *existing;
            drop(existing);
            let mut was_tombstoned = false;
            if let Some(mut entry) = self.cards_by_pos.get_mut(&position) {
                if !entry.live {
                    entry.live = true;
                    was_tombstoned = true;
                }
            }
            if was_tombstoned {
                self.live.write().insert(position.value());
                self.live_version.fetch_add(1, Ordering::SeqCst);
                self.append_card_record(position, card_ext_id, true)?;
            }
            return Ok(position);
        }

        let position = {
            let mut next = self.next_position.lock();
            let position = Position(*next);
            *next += 1;
            position
        };
        self.cards_by_ext.insert(card_ext_id.clone(), position);
        self.cards_by_pos.insert(
            position,
            CardEntry {
                ext_id: card_ext_id.clone(),
                live: true,
            },
        );
        self.live.write().insert(position.value());
        self.live_version.fetch_add(1, Ordering::SeqCst);
        self.append_card_record(position, card_ext_id, true)?;
        Ok(position)
    }

    /// Idempotent on `tag_ext_name`; `tag_type` is fixed at first intern
    /// (§3) — a later call with a different type is a no-op against the
    /// stored type, logged at `warn` level by the caller if it cares.
    pub fn intern_tag(&self, tag_ext_name: &TagExtId, tag_type: TagType) -> EngineResult<TagId> {
        if let Some(existing) = self.tags_by_ext.get(tag_ext_name) {
            return Ok(*existing);
        }
        let tag_id = {
            let mut next = self.next_tag_id.lock();
            let tag_id = TagId(*next);
            *next += 1;
            tag_id
        };
        self.tags_by_ext.insert(tag_ext_name.clone(), tag_id);
        self.tags_by_id
            .insert(tag_id, (tag_ext_name.clone(), tag_type));
        self.append_tag_record(tag_id, tag_ext_name, tag_type, false)?;
        Ok(tag_id)
    }

    /// Pure Catalog op: repoints `old`'s `TagId` at `new`. Never touches
    /// any bitmap (§4.5). Returns `NotFound` if `old` is unknown; a no-op
    /// if `old == new`.
    pub fn rename_tag(&self, old: &TagExtId, new: &TagExtId) -> EngineResult<TagId> {
        if old == new {
            if let Some(id) = self.tags_by_ext.get(old) {
                return Ok(*id);
            }
        }
        let tag_id = self
            .tags_by_ext
            .remove(old)
            .map(|(_, id)| id)
            .ok_or_else(|| tagengine_core::EngineError::not_found(format!("tag '{old}'")))?;
        let tag_type = self
            .tags_by_id
            .get(&tag_id)
            .map(|r| r.1)
            .unwrap_or(TagType::User);
        self.tags_by_ext.insert(new.clone(), tag_id);
        self.tags_by_id.insert(tag_id, (new.clone(), tag_type));
        self.append_tag_record(tag_id, new, tag_type, false)?;
        Ok(tag_id)
    }

    /// Removes a tag's catalog entry entirely (§4.5 `delete_tag`); the
    /// caller (Writer) is responsible for deleting the bitmap itself.
    pub fn remove_tag(&self, tag_ext_name: &TagExtId) -> EngineResult<Option<TagId>> {
        let Some((_, tag_id)) = self.tags_by_ext.remove(tag_ext_name) else {
            return Ok(None);
        };
        let tag_type = self
            .tags_by_id
            .remove(&tag_id)
            .map(|(_, (_, t))| t)
            .unwrap_or(TagType::User);
        self.append_tag_record(tag_id, tag_ext_name, tag_type, true)?;
        Ok(Some(tag_id))
    }

    /// Look up a tag id without interning — used by the planner to
    /// silently treat unresolvable names as the empty set (§4.4 step 1).
    pub fn lookup_tag(&self, tag_ext_name: &TagExtId) -> Option<TagId> {
        self.tags_by_ext.get(tag_ext_name).map(|r| *r)
    }

    /// `None` if the position is absent or tombstoned.
    pub fn resolve_card(&self, position: Position) -> Option<CardExtId> {
        self.cards_by_pos.get(&position).and_then(|e| {
            if e.live {
                Some(e.ext_id.clone())
            } else {
                None
            }
        })
    }

    /// `None` if the tag id is unknown.
    pub fn resolve_tag(&self, tag_id: TagId) -> Option<(TagExtId, TagType)> {
        self.tags_by_id.get(&tag_id).map(|r| r.clone())
    }

    /// The position assigned to `card_ext_id`, live or tombstoned.
    /// `None` if the card has never been interned.
    pub fn position_of(&self, card_ext_id: &CardExtId) -> Option<Position> {
        self.cards_by_ext.get(card_ext_id).map(|r| *r)
    }

    /// Mark `position` as not-live. The position is never reissued
    /// (§4.2: monotonic allocation, no recycling — see DESIGN.md).
    pub fn tombstone_card(&self, position: Position) -> EngineResult<()> {
        let ext_id = match self.cards_by_pos.get_mut(&position) {
            Some(mut entry) if entry.live => {
                entry.live = false;
                entry.ext_id.clone()
            }
            _ => return Ok(()), // already tombstoned or never existed: no-op
        };
        self.live.write().remove(position.value());
        self.live_version.fetch_add(1, Ordering::SeqCst);
        self.append_card_record(position, &ext_id, false)?;
        Ok(())
    }

    /// Tombstone by external id; a no-op if the card is unknown.
    pub fn tombstone_card_by_ext_id(&self, card_ext_id: &CardExtId) -> EngineResult<()> {
        if let Some(position) = self.cards_by_ext.get(card_ext_id) {
            self.tombstone_card(*position)?;
        }
        Ok(())
    }

    /// `Live_W`: the bitmap of all non-tombstoned positions.
    pub fn live_bitmap(&self) -> RoaringBitmap {
        self.live.read().clone()
    }

    /// Monotonically increasing generation counter for `Live_W`, bumped
    /// on every intern/tombstone that changes liveness. Used as the
    /// `(LIVE_TAG_ID, version)` entry in the result-cache fingerprint so
    /// that a liveness change alone invalidates cached results (§4.4
    /// step 7, §4.5).
    pub fn live_version(&self) -> u64 {
        self.live_version.load(Ordering::SeqCst)
    }

    /// Card count including tombstoned ones (`next_position` high-water
    /// mark) — used by `introspect` (§6).
    pub fn card_count(&self) -> usize {
        self.cards_by_pos.len()
    }

    /// Distinct tag count known to this catalog — used by `introspect`.
    pub fn tag_count(&self) -> usize {
        self.tags_by_id.len()
    }

    /// All known tag ids, for `rebuild-index` (§6).
    pub fn all_tag_ids(&self) -> Vec<TagId> {
        self.tags_by_id.iter().map(|r| *r.key()).collect()
    }

    /// All live positions with their current tag assignments are not
    /// tracked by the Catalog itself (see the per-card tag-set auxiliary
    /// maintained by the Writer, §4.5); the Catalog only owns identity
    /// and liveness.
    pub fn live_positions(&self) -> Vec<Position> {
        self.live.read().iter().map(Position).collect()
    }

    fn append_card_record(
        &self,
        position: Position,
        ext_id: &CardExtId,
        live: bool,
    ) -> EngineResult<()> {
        if let Some(log) = &self.card_log {
            let record = CardRecord {
                position: position.value(),
                card_ext_id: ext_id.as_str().to_string(),
                live,
            };
            let bytes = bincode::serialize(&record)
                .map_err(|e| tagengine_core::EngineError::corrupt(e.to_string()))?;
            log.append(&bytes)
                .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
        }
        Ok(())
    }

    fn append_tag_record(
        &self,
        tag_id: TagId,
        ext_id: &TagExtId,
        tag_type: TagType,
        deleted: bool,
    ) -> EngineResult<()> {
        if let Some(log) = &self.tag_log {
            let record = TagRecord {
                tag_id: tag_id.value(),
                tag_ext_name: ext_id.as_str().to_string(),
                tag_type: encode_tag_type(tag_type),
                deleted,
            };
            let bytes = bincode::serialize(&record)
                .map_err(|e| tagengine_core::EngineError::corrupt(e.to_string()))?;
            log.append(&bytes)
                .map_err(|e| tagengine_core::EngineError::unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

fn encode_tag_type(t: TagType) -> u8 {
    match t {
        TagType::User => 0,
        TagType::SystemOperator => 1,
        TagType::SystemModifier => 2,
        TagType::SystemMutation => 3,
    }
}

fn decode_tag_type(v: u8) -> TagType {
    match v {
        1 => TagType::SystemOperator,
        2 => TagType::SystemModifier,
        3 => TagType::SystemMutation,
        _ => TagType::User,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_card_is_idempotent() {
        let cat = Catalog::in_memory();
        let id = CardExtId::new("c1");
        let p1 = cat.intern_card(&id).unwrap();
        let p2 = cat.intern_card(&id).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn intern_assigns_smallest_unused_positions() {
        let cat = Catalog::in_memory();
        let p1 = cat.intern_card(&CardExtId::new("c1")).unwrap();
        let p2 = cat.intern_card(&CardExtId::new("c2")).unwrap();
        assert_eq!(p1, Position(0));
        assert_eq!(p2, Position(1));
    }

    #[test]
    fn tombstone_excludes_from_live_and_resolve() {
        let cat = Catalog::in_memory();
        let id = CardExtId::new("c1");
        let pos = cat.intern_card(&id).unwrap();
        cat.tombstone_card(pos).unwrap();
        assert!(cat.resolve_card(pos).is_none());
        assert!(!cat.live_bitmap().contains(pos.value()));
    }

    #[test]
    fn reinterning_a_tombstoned_card_revives_it() {
        let cat = Catalog::in_memory();
        let id = CardExtId::new("c1");
        let pos = cat.intern_card(&id).unwrap();
        cat.tombstone_card(pos).unwrap();
        let revived = cat.intern_card(&id).unwrap();
        assert_eq!(revived, pos);
        assert!(cat.resolve_card(pos).is_some());
        assert!(cat.live_bitmap().contains(pos.value()));
    }

    #[test]
    fn tag_type_is_fixed_at_first_intern() {
        let cat = Catalog::in_memory();
        let name = TagExtId::new("red");
        let id1 = cat.intern_tag(&name, TagType::User).unwrap();
        let id2 = cat.intern_tag(&name, TagType::SystemOperator).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(cat.resolve_tag(id1).unwrap().1, TagType::User);
    }

    #[test]
    fn persistent_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cat = Catalog::open(dir.path()).unwrap();
            let pos = cat.intern_card(&CardExtId::new("c1")).unwrap();
            assert_eq!(pos, Position(0));
            cat.intern_tag(&TagExtId::new("red"), TagType::User)
                .unwrap();
        }
        let reopened = Catalog::open(dir.path()).unwrap();
        assert_eq!(
            reopened.resolve_card(Position(0)),
            Some(CardExtId::new("c1"))
        );
        assert_eq!(
            reopened.lookup_tag(&TagExtId::new("red")),
            Some(TagId(0))
        );
        // Next intern must not collide with the replayed position.
        let p2 = reopened.intern_card(&CardExtId::new("c2")).unwrap();
        assert_eq!(p2, Position(1));
    }

    #[test]
    fn rename_tag_repoints_name_without_changing_id() {
        let cat = Catalog::in_memory();
        let old = TagExtId::new("red");
        let new = TagExtId::new("crimson");
        let id = cat.intern_tag(&old, TagType::User).unwrap();
        let renamed = cat.rename_tag(&old, &new).unwrap();
        assert_eq!(id, renamed);
        assert_eq!(cat.lookup_tag(&old), None);
        assert_eq!(cat.lookup_tag(&new), Some(id));
    }

    #[test]
    fn rename_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let old = TagExtId::new("red");
        let new = TagExtId::new("crimson");
        {
            let cat = Catalog::open(dir.path()).unwrap();
            cat.intern_tag(&old, TagType::User).unwrap();
            cat.rename_tag(&old, &new).unwrap();
        }
        let reopened = Catalog::open(dir.path()).unwrap();
        assert_eq!(reopened.lookup_tag(&old), None);
        assert!(reopened.lookup_tag(&new).is_some());
    }

    #[test]
    fn remove_tag_drops_catalog_entry() {
        let cat = Catalog::in_memory();
        let name = TagExtId::new("red");
        let id = cat.intern_tag(&name, TagType::User).unwrap();
        let removed = cat.remove_tag(&name).unwrap();
        assert_eq!(removed, Some(id));
        assert_eq!(cat.lookup_tag(&name), None);
        assert_eq!(cat.remove_tag(&name).unwrap(), None);
    }
}

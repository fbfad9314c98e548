//! Index Writer (§4.5): turns a batch of card-level mutations into a
//! new, consistent snapshot of the affected bitmaps, under the caller's
//! per-workspace exclusive write lock.
//!
//! Mutations go through two phases, matching the source's "preview then
//! commit" workflow (§9): [`Writer::plan`] diffs the batch against
//! current catalog/tag-set state and returns a [`MutationPlan`] without
//! touching any bitmap; [`Writer::apply`] commits that plan's bit
//! changes to the store and invalidates caches. [`Writer::apply_batch`]
//! is the common plan-then-apply convenience for callers that don't need
//! the preview step.

use roaring::RoaringBitmap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tagengine_cache::{BitmapCache, ResultCache};
use tagengine_catalog::Catalog;
use tagengine_core::{CardMutation, EngineError, EngineResult, Position, TagId, TagType, WorkspaceId};
use tagengine_storage::BitmapStore;

use crate::card_tags::CardTagIndex;

/// Per-key CAS retries bounded small (§4.5: "writer is single per
/// workspace, so CAS failure is limited to store-level concurrency and
/// should be rare").
const MAX_CAS_RETRIES: u32 = 8;

/// A single bit flip a plan will apply to `tag_id`'s bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitChange {
    pub tag_id: TagId,
    pub position: Position,
    pub present: bool,
}

/// A tag whose current tag-set membership is replaced wholesale as part
/// of an `upsert_card` (recorded so `apply` can update `CardTagIndex`
/// without recomputing the diff).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardTagEffect {
    SetTags { position: Position, tags: Vec<TagId> },
    Clear { position: Position },
}

/// The pure, serializable result of diffing a mutation batch against
/// current catalog and tag-set state — no bitmap has been read or
/// written yet. A caller embedding the engine behind an RPC layer can
/// ship this to a UI for confirmation before calling [`Writer::apply`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationPlan {
    bit_changes: Vec<BitChange>,
    card_tag_effects: Vec<CardTagEffect>,
    tag_deletions: Vec<TagId>,
    touched_tags: Vec<TagId>,
}

impl MutationPlan {
    /// Every tag bitmap this plan will touch when applied.
    pub fn touched_tags(&self) -> &[TagId] {
        &self.touched_tags
    }

    fn touch(&mut self, tag_id: TagId) {
        if !self.touched_tags.contains(&tag_id) {
            self.touched_tags.push(tag_id);
        }
    }
}

pub struct Writer<'a> {
    pub store: &'a dyn BitmapStore,
    pub catalog: &'a Catalog,
    pub card_tags: &'a CardTagIndex,
    pub bitmap_cache: &'a BitmapCache,
    pub result_cache: &'a ResultCache,
}

impl<'a> Writer<'a> {
    /// Plan `mutations` (`Received -> Locked -> Diffed`, §4.5): interns
    /// any new card/tag names (position and tag-id assignment is not
    /// meaningfully previewable without allocating, since "preview" for a
    /// brand-new name just *is* its assignment) and diffs each card's
    /// desired tag set against `CardTagIndex`, but performs no bitmap
    /// reads or writes. Caller must hold the workspace's exclusive write
    /// lock for the duration of both `plan` and the matching `apply`.
    pub fn plan(
        &self,
        mutations: &[CardMutation],
    ) -> EngineResult<MutationPlan> {
        let mut plan = MutationPlan::default();
        for mutation in mutations {
            self.plan_one(mutation, &mut plan)?;
        }
        Ok(plan)
    }

    fn plan_one(&self, mutation: &CardMutation, plan: &mut MutationPlan) -> EngineResult<()> {
        match mutation {
            CardMutation::UpsertCard { card_ext_id, tags } => {
                let position = self.catalog.intern_card(card_ext_id)?;
                let mut new_tags = FxHashSet::default();
                for name in tags {
                    new_tags.insert(self.catalog.intern_tag(name, TagType::User)?);
                }
                let old_tags = self.card_tags.tags_of(position);

                let added: Vec<TagId> = new_tags.difference(&old_tags).copied().collect();
                let removed: Vec<TagId> = old_tags.difference(&new_tags).copied().collect();

                for tag_id in added {
                    plan.bit_changes.push(BitChange { tag_id, position, present: true });
                    plan.touch(tag_id);
                }
                for tag_id in removed {
                    plan.bit_changes.push(BitChange { tag_id, position, present: false });
                    plan.touch(tag_id);
                }
                plan.card_tag_effects.push(CardTagEffect::SetTags {
                    position,
                    tags: new_tags.into_iter().collect(),
                });
                Ok(())
            }
            CardMutation::DeleteCard { card_ext_id } => {
                let Some(position) = self.catalog.position_of(card_ext_id) else {
                    return Err(EngineError::not_found(format!("card '{card_ext_id}'")));
                };
                let tags = self.card_tags.tags_of(position);
                for tag_id in tags {
                    plan.bit_changes.push(BitChange { tag_id, position, present: false });
                    plan.touch(tag_id);
                }
                plan.card_tag_effects.push(CardTagEffect::Clear { position });
                self.catalog.tombstone_card(position)
            }
            CardMutation::RenameTag { old, new } => {
                self.catalog.rename_tag(old, new)?;
                Ok(())
            }
            CardMutation::DeleteTag { tag_ext_name } => {
                if let Some(tag_id) = self.catalog.remove_tag(tag_ext_name)? {
                    plan.tag_deletions.push(tag_id);
                    plan.touch(tag_id);
                }
                Ok(())
            }
        }
    }

    /// Commit a previously computed plan (`Writing -> Committed`, §4.5):
    /// performs the per-tag CAS bitmap writes, updates `CardTagIndex`,
    /// and invalidates the bitmap/result caches for every touched tag.
    pub fn apply(&self, workspace: &WorkspaceId, plan: &MutationPlan) -> EngineResult<()> {
        let span = tracing::info_span!(
            "mutation_batch",
            %workspace,
            bit_changes = plan.bit_changes.len()
        );
        let _guard = span.enter();
        tracing::debug!(state = "Writing");

        for change in &plan.bit_changes {
            self.set_bit(workspace, change.tag_id, change.position, change.present)?;
        }
        for &tag_id in &plan.tag_deletions {
            self.store.delete(workspace, tag_id)?;
        }

        for effect in &plan.card_tag_effects {
            match effect {
                CardTagEffect::SetTags { position, tags } => {
                    self.card_tags.set_tags(*position, tags.iter().copied().collect());
                }
                CardTagEffect::Clear { position } => {
                    self.card_tags.clear(*position);
                }
            }
        }
        for &tag_id in &plan.tag_deletions {
            self.card_tags.forget_tag(tag_id);
        }

        tracing::debug!(state = "Committed", touched = plan.touched_tags.len());
        for &tag_id in &plan.touched_tags {
            self.bitmap_cache.invalidate(workspace, tag_id);
            self.result_cache.invalidate_tag(workspace, tag_id);
        }
        Ok(())
    }

    /// Apply `mutations` as one batch, planning and committing in one
    /// call. Caller must hold the workspace's exclusive write lock for
    /// the duration of this call (§5).
    pub fn apply_batch(
        &self,
        workspace: &WorkspaceId,
        mutations: &[CardMutation],
    ) -> EngineResult<()> {
        tracing::debug!(state = "Received", count = mutations.len());
        tracing::debug!(state = "Locked");
        let plan = self.plan(mutations)?;
        tracing::debug!(state = "Diffed");
        self.apply(workspace, &plan)
    }

    /// Read-modify-CAS-write a single bit, retrying on `StaleVersion`
    /// (internal; never surfaced — §7).
    fn set_bit(
        &self,
        workspace: &WorkspaceId,
        tag_id: TagId,
        position: Position,
        present: bool,
    ) -> EngineResult<()> {
        for attempt in 0..MAX_CAS_RETRIES {
            let (mut bitmap, expected_version) = match self.store.try_get(workspace, tag_id)? {
                Some(record) => (record.bitmap, Some(record.version)),
                None => (RoaringBitmap::new(), None),
            };
            if present {
                bitmap.insert(position.value());
            } else {
                bitmap.remove(position.value());
            }
            let new_version = expected_version.unwrap_or(0) + 1;
            if self
                .store
                .compare_and_swap(workspace, tag_id, &bitmap, expected_version, new_version)?
            {
                return Ok(());
            }
            tracing::warn!(%workspace, %tag_id, attempt, "StaleVersion retry in writer");
        }
        Err(EngineError::unavailable(format!(
            "tag {tag_id} exceeded CAS retry bound under contention"
        )))
    }
}

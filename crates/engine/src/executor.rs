//! Query Planner & Executor (§4.4): the eight-step algorithm that turns
//! a resolved [`Query`] into a materialized [`ResultSet`].

use std::sync::Arc;

use rayon::ThreadPool;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use tagengine_cache::{BitmapCache, CacheEntry, ResultCache};
use tagengine_catalog::Catalog;
use tagengine_core::{
    EngineError, EngineResult, Fingerprint, Position, Query, QueryOptions, ResultSet, TagId,
    WorkspaceId, LIVE_TAG_ID,
};
use tagengine_storage::BitmapStore;

use crate::fingerprint;
use crate::resolve::ResolvedQuery;

/// Cancellation/deadline check cadence during materialization (§5): at
/// this many positions, overhead of the check stays well under 1%.
const CHECK_INTERVAL: usize = 4096;

/// Below this many operands, a pairwise OR folds sequentially; above it,
/// `rayon::join` builds a balanced tree (§4.4 parallel fold note).
const PARALLEL_FOLD_THRESHOLD: usize = 4;

/// Step 2 fetches each referenced tag's bitmap one at a time, so a
/// concurrent multi-tag commit can land in the gap between two of those
/// fetches. This bounds how many times the snapshot is retaken after
/// detecting that gap before giving up (mirrors `writer::MAX_CAS_RETRIES`).
const MAX_SNAPSHOT_RETRIES: u32 = 8;

/// Everything the executor needs to run one query against one
/// workspace. Borrowed, not owned — callers (the `Engine` facade) own
/// the long-lived state.
pub struct Executor<'a> {
    pub store: &'a dyn BitmapStore,
    pub bitmap_cache: &'a BitmapCache,
    pub result_cache: &'a ResultCache,
    pub catalog: &'a Catalog,
    pub pool: &'a ThreadPool,
}

impl<'a> Executor<'a> {
    /// Run the full eight-step algorithm (§4.4) for `resolved` against
    /// `workspace`.
    pub fn execute(
        &self,
        workspace: &WorkspaceId,
        resolved: &ResolvedQuery,
        options: &QueryOptions,
    ) -> EngineResult<ResultSet> {
        check_cancelled(options)?;

        // Step 1 (unknown-tag half): an unresolvable intersection tag
        // forces the empty set immediately, without touching any store.
        if resolved.unresolved_intersection {
            let fp = fingerprint::compute(workspace, &resolved.query, &[]);
            tracing::debug!(%fp, %workspace, "unresolved intersection tag; result forced empty");
            return Ok(ResultSet::empty(fp));
        }

        let query = &resolved.query;

        // Step 2: fetch every referenced bitmap through the cache,
        // recording the version actually observed. `Live_W` is always
        // read too since step 7 applies it unconditionally.
        let mut referenced: Vec<TagId> = query
            .intersection
            .iter()
            .chain(query.union.iter())
            .chain(query.exclusion.iter())
            .copied()
            .collect();
        referenced.sort_unstable_by_key(TagId::value);
        referenced.dedup();

        let (fetched, observed_versions) =
            self.fetch_consistent_snapshot(workspace, &referenced, options)?;

        let fingerprint = fingerprint::compute(workspace, query, &observed_versions);

        if !options.bypass_result_cache {
            if let Some(hit) = self.result_cache.lookup(fingerprint) {
                tracing::debug!(%fingerprint, %workspace, "result cache hit");
                return Ok((*hit).clone());
            }
        }

        check_cancelled(options)?;

        let build = || self.plan_and_materialize(query, &fetched, fingerprint, options);

        let result_set = if options.bypass_result_cache {
            build()?
        } else {
            let cached =
                self.result_cache
                    .get_or_build(fingerprint, workspace, &referenced, build)?;
            (*cached).clone()
        };

        tracing::debug!(
            %fingerprint,
            %workspace,
            total = result_set.total,
            truncated = result_set.truncated,
            "query materialized"
        );
        Ok(result_set)
    }

    /// Step 2, made atomic: fetch every tag in `referenced` plus `Live_W`
    /// and keep retrying the whole batch until one pass observes every
    /// version unchanged from the pass before it. A writer's commit
    /// touches several tags and invalidates each one's cache entry as it
    /// goes (`writer::apply`), so two back-to-back per-tag fetches can
    /// straddle that commit and return a mix of pre- and post-commit
    /// versions; re-checking after the fold catches that and retries
    /// rather than handing out `observed_versions` that were never all
    /// simultaneously current (§5, P3).
    fn fetch_consistent_snapshot(
        &self,
        workspace: &WorkspaceId,
        referenced: &[TagId],
        options: &QueryOptions,
    ) -> EngineResult<(FxHashMap<TagId, Arc<CacheEntry>>, Vec<(TagId, u64)>)> {
        let mut fetched: FxHashMap<TagId, Arc<CacheEntry>> = FxHashMap::default();
        let mut observed_versions: Vec<(TagId, u64)> = Vec::with_capacity(referenced.len() + 1);

        for attempt in 0..MAX_SNAPSHOT_RETRIES {
            fetched.clear();
            observed_versions.clear();
            observed_versions.push((LIVE_TAG_ID, self.catalog.live_version()));

            for &tag_id in referenced {
                check_cancelled(options)?;
                let entry = self.fetch(workspace, tag_id)?;
                observed_versions.push((tag_id, entry.version));
                fetched.insert(tag_id, entry);
            }

            if self.snapshot_still_current(workspace, referenced, &observed_versions, options)? {
                return Ok((fetched, observed_versions));
            }
            tracing::warn!(%workspace, attempt, "version snapshot raced a concurrent commit, retrying");
        }

        Err(EngineError::unavailable(
            "query exceeded snapshot retry bound under write contention",
        ))
    }

    /// Re-reads `Live_W`'s version and every referenced tag's cached
    /// version and compares them against `observed_versions`. `true`
    /// means nothing moved between the fold and this check, so the
    /// snapshot is safe to hand to the planner/result cache.
    fn snapshot_still_current(
        &self,
        workspace: &WorkspaceId,
        referenced: &[TagId],
        observed_versions: &[(TagId, u64)],
        options: &QueryOptions,
    ) -> EngineResult<bool> {
        if self.catalog.live_version() != observed_versions[0].1 {
            return Ok(false);
        }
        for (i, &tag_id) in referenced.iter().enumerate() {
            check_cancelled(options)?;
            let recorded = observed_versions[i + 1].1;
            if self.fetch(workspace, tag_id)?.version != recorded {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn fetch(&self, workspace: &WorkspaceId, tag_id: TagId) -> EngineResult<Arc<CacheEntry>> {
        let store = self.store;
        let ws = workspace.clone();
        self.bitmap_cache
            .get_or_load((workspace.clone(), tag_id), move || {
                match store.try_get(&ws, tag_id)? {
                    Some(record) => Ok((record.bitmap, record.version)),
                    None => Ok((RoaringBitmap::new(), 0)),
                }
            })
    }

    /// Steps 3-8 of §4.4, given already-fetched bitmaps.
    fn plan_and_materialize(
        &self,
        query: &Query,
        fetched: &FxHashMap<TagId, Arc<CacheEntry>>,
        fingerprint: Fingerprint,
        options: &QueryOptions,
    ) -> EngineResult<ResultSet> {
        let live = self.catalog.live_bitmap();

        if query.is_unfiltered() {
            return self.materialize(live, query.limit, fingerprint, options);
        }

        // Step 3: order I by ascending selectivity, tie-break by tag_id.
        let live_len = live.len().max(1) as f64;
        let mut order: Vec<TagId> = query.intersection.iter().copied().collect();
        order.sort_by(|a, b| {
            let selectivity = |t: &TagId| -> f64 {
                fetched.get(t).map(|e| e.bitmap.len()).unwrap_or(0) as f64 / live_len
            };
            selectivity(a)
                .partial_cmp(&selectivity(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.value().cmp(&b.value()))
        });

        // Step 4: intersection fold. An empty `I` is the universal set
        // (vacuous intersection), narrowed by union/exclusion below.
        let mut acc = match order.first() {
            Some(first) => fetched
                .get(first)
                .map(|e| e.bitmap.clone())
                .unwrap_or_default(),
            None => live.clone(),
        };
        for tag_id in order.iter().skip(1) {
            check_cancelled(options)?;
            if acc.is_empty() {
                break;
            }
            let next = fetched
                .get(tag_id)
                .map(|e| &e.bitmap)
                .cloned()
                .unwrap_or_default();
            acc = &acc & &next;
        }

        check_cancelled(options)?;

        // Step 5: union.
        if !query.union.is_empty() && !acc.is_empty() {
            let bitmaps: Vec<RoaringBitmap> = query
                .union
                .iter()
                .map(|t| fetched.get(t).map(|e| e.bitmap.clone()).unwrap_or_default())
                .collect();
            let union = self.balanced_or(&bitmaps);
            acc = &acc & &union;
        }

        check_cancelled(options)?;

        // Step 6: exclusion.
        if !query.exclusion.is_empty() && !acc.is_empty() {
            let bitmaps: Vec<RoaringBitmap> = query
                .exclusion
                .iter()
                .map(|t| fetched.get(t).map(|e| e.bitmap.clone()).unwrap_or_default())
                .collect();
            let excluded = self.balanced_or(&bitmaps);
            acc = &acc - &excluded;
        }

        // Step 7: liveness (defensive; every input is already a subset
        // of Live_W in the absence of bugs elsewhere).
        acc = &acc & &live;

        self.materialize(acc, query.limit, fingerprint, options)
    }

    fn balanced_or(&self, bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
        fn fold(bitmaps: &[RoaringBitmap]) -> RoaringBitmap {
            match bitmaps.len() {
                0 => RoaringBitmap::new(),
                1 => bitmaps[0].clone(),
                n if n <= PARALLEL_FOLD_THRESHOLD => {
                    let mut acc = bitmaps[0].clone();
                    for b in &bitmaps[1..] {
                        acc = &acc | b;
                    }
                    acc
                }
                n => {
                    let mid = n / 2;
                    let (left, right) = bitmaps.split_at(mid);
                    let (l, r) = rayon::join(|| fold(left), || fold(right));
                    &l | &r
                }
            }
        }
        self.pool.install(|| fold(bitmaps))
    }

    /// Step 8: ascending-position materialization with limit and
    /// cancellation checks.
    fn materialize(
        &self,
        acc: RoaringBitmap,
        limit: Option<usize>,
        fingerprint: Fingerprint,
        options: &QueryOptions,
    ) -> EngineResult<ResultSet> {
        let total = acc.len() as usize;
        let truncated = limit.is_some_and(|l| total > l);
        let take = limit.unwrap_or(usize::MAX);

        let mut ids = Vec::with_capacity(take.min(total));
        for (i, pos) in acc.iter().enumerate() {
            if ids.len() >= take {
                break;
            }
            if i % CHECK_INTERVAL == 0 {
                check_cancelled(options)?;
            }
            if let Some(card_id) = self.catalog.resolve_card(Position(pos)) {
                ids.push(card_id);
            }
        }

        Ok(ResultSet {
            ids,
            total,
            truncated,
            fingerprint,
        })
    }
}

fn check_cancelled(options: &QueryOptions) -> EngineResult<()> {
    if let Some(token) = &options.cancel_token {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
    }
    if let Some(deadline) = &options.deadline {
        if deadline.is_exceeded() {
            return Err(EngineError::DeadlineExceeded);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagengine_cache::{BitmapCache, ResultCache};
    use tagengine_core::{CardExtId, TagExtId, TagType};
    use tagengine_storage::MemBitmapStore;

    fn make<'a>(
        store: &'a MemBitmapStore,
        bitmap_cache: &'a BitmapCache,
        result_cache: &'a ResultCache,
        catalog: &'a Catalog,
        pool: &'a ThreadPool,
    ) -> Executor<'a> {
        Executor {
            store,
            bitmap_cache,
            result_cache,
            catalog,
            pool,
        }
    }

    fn setup() -> (MemBitmapStore, BitmapCache, ResultCache, Catalog, ThreadPool) {
        (
            MemBitmapStore::new(),
            BitmapCache::new(1 << 20),
            ResultCache::new(64),
            Catalog::in_memory(),
            rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap(),
        )
    }

    #[test]
    fn unfiltered_query_returns_live_set() {
        let (store, bc, rc, catalog, pool) = setup();
        let ws = WorkspaceId::new("w1");
        let p0 = catalog.intern_card(&CardExtId::new("c1")).unwrap();
        let p1 = catalog.intern_card(&CardExtId::new("c2")).unwrap();
        let _ = (p0, p1);
        let _ = store; // unused directly; executor reads through it

        let exec = make(&store, &bc, &rc, &catalog, &pool);
        let resolved = crate::resolve::resolve(&catalog, &crate::resolve::NameQuery::default());
        let result = exec
            .execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.ids.len(), 2);
    }

    #[test]
    fn unresolved_intersection_tag_yields_empty() {
        let (store, bc, rc, catalog, pool) = setup();
        let ws = WorkspaceId::new("w1");
        catalog.intern_card(&CardExtId::new("c1")).unwrap();
        let exec = make(&store, &bc, &rc, &catalog, &pool);
        let names = crate::resolve::NameQuery {
            intersection: vec![TagExtId::new("ghost")],
            ..Default::default()
        };
        let resolved = crate::resolve::resolve(&catalog, &names);
        let result = exec
            .execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(result.total, 0);
        assert!(result.ids.is_empty());
    }

    #[test]
    fn intersection_excludes_non_matching_cards() {
        let (store, bc, rc, catalog, pool) = setup();
        let ws = WorkspaceId::new("w1");
        let p0 = catalog.intern_card(&CardExtId::new("c1")).unwrap();
        let _p1 = catalog.intern_card(&CardExtId::new("c2")).unwrap();
        let red = catalog
            .intern_tag(&TagExtId::new("red"), TagType::User)
            .unwrap();
        let mut bmp = RoaringBitmap::new();
        bmp.insert(p0.value());
        store.put(&ws, red, &bmp, 1).unwrap();

        let exec = make(&store, &bc, &rc, &catalog, &pool);
        let names = crate::resolve::NameQuery {
            intersection: vec![TagExtId::new("red")],
            ..Default::default()
        };
        let resolved = crate::resolve::resolve(&catalog, &names);
        let result = exec
            .execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.ids, vec![CardExtId::new("c1")]);
    }

    #[test]
    fn non_disjoint_intersection_and_exclusion_yields_empty_for_shared_tag() {
        let (store, bc, rc, catalog, pool) = setup();
        let ws = WorkspaceId::new("w1");
        let p0 = catalog.intern_card(&CardExtId::new("c1")).unwrap();
        let red = catalog
            .intern_tag(&TagExtId::new("red"), TagType::User)
            .unwrap();
        let mut bmp = RoaringBitmap::new();
        bmp.insert(p0.value());
        store.put(&ws, red, &bmp, 1).unwrap();

        let exec = make(&store, &bc, &rc, &catalog, &pool);
        let names = crate::resolve::NameQuery {
            intersection: vec![TagExtId::new("red")],
            exclusion: vec![TagExtId::new("red")],
            ..Default::default()
        };
        let resolved = crate::resolve::resolve(&catalog, &names);
        let result = exec
            .execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn repeated_identical_query_hits_result_cache() {
        let (store, bc, rc, catalog, pool) = setup();
        let ws = WorkspaceId::new("w1");
        catalog.intern_card(&CardExtId::new("c1")).unwrap();
        let exec = make(&store, &bc, &rc, &catalog, &pool);
        let resolved = crate::resolve::resolve(&catalog, &crate::resolve::NameQuery::default());
        exec.execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(rc.len(), 1);
        exec.execute(&ws, &resolved, &QueryOptions::default())
            .unwrap();
        assert_eq!(rc.len(), 1);
    }
}

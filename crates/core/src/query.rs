use crate::cancel::{CancelToken, Deadline};
use crate::ids::TagId;
use std::collections::BTreeSet;

/// `Q = (I, O, X, limit?)` — intersection tags, union tags, exclusion
/// tags, and an optional result-count cap (§3).
///
/// `I`, `O`, `X` are kept as `BTreeSet` rather than `HashSet` so that
/// iteration order is already ascending-by-`tag_id` wherever a caller
/// needs it, and so the canonical fingerprint encoding (§4.5) never has
/// to sort on the hot path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    /// Intersection tag ids (Phase 1, AND).
    pub intersection: BTreeSet<TagId>,
    /// Union tag ids (Phase 2, OR), scoped within the Phase 1 universe.
    pub union: BTreeSet<TagId>,
    /// Exclusion tag ids (NONE-of).
    pub exclusion: BTreeSet<TagId>,
    /// Optional cap on the number of materialized ids.
    pub limit: Option<usize>,
}

impl Query {
    /// A query with no filters at all: `I = O = X = ∅`. Resolves to
    /// `Live_W` (§4.4 step 1, boundary B1).
    pub fn everything() -> Self {
        Query::default()
    }

    /// Whether this query carries no tag filters whatsoever.
    pub fn is_unfiltered(&self) -> bool {
        self.intersection.is_empty() && self.union.is_empty() && self.exclusion.is_empty()
    }
}

/// Execution knobs that sit alongside a [`Query`] but are not part of its
/// canonical identity: deadline, cancellation, and whether to skip the
/// result cache. `options ⊆ {limit, deadline, cancel_token,
/// bypass_result_cache}` per §6; `limit` itself lives on [`Query`] since
/// it is part of `Q`'s mathematical definition (§3) and therefore part of
/// the fingerprint.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Wall-clock deadline for this query.
    pub deadline: Option<Deadline>,
    /// Cooperative cancellation handle.
    pub cancel_token: Option<CancelToken>,
    /// Skip the result cache on read; the fresh result is still stored.
    pub bypass_result_cache: bool,
}

use crate::ids::{CardExtId, Fingerprint};
use serde::{Deserialize, Serialize};

/// Materialized query result: card ids up to `limit`, the true total
/// cardinality of `R(Q)`, whether truncation occurred, and the
/// fingerprint that would key this exact result in the result cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Card external ids, ascending by internal position, truncated to
    /// `limit` when present.
    pub ids: Vec<CardExtId>,
    /// `|R(Q)|`, independent of truncation.
    pub total: usize,
    /// `true` iff `limit` was present and `total > limit`.
    pub truncated: bool,
    /// Canonical fingerprint of the query that produced this result.
    pub fingerprint: Fingerprint,
}

impl ResultSet {
    /// The canonical empty result (e.g. unknown tag in `I`, boundary B2).
    pub fn empty(fingerprint: Fingerprint) -> Self {
        ResultSet {
            ids: Vec::new(),
            total: 0,
            truncated: false,
            fingerprint,
        }
    }
}

//! Query name resolution (§4.4 step 1): external tag names to internal
//! `TagId`s, with the "unknown tag" asymmetry between `I` and `O`/`X`.

use std::collections::BTreeSet;

use tagengine_catalog::Catalog;
use tagengine_core::{Query, TagExtId};

/// A query as it arrives over the wire: external tag names, not yet
/// resolved against any particular workspace's catalog.
#[derive(Debug, Clone, Default)]
pub struct NameQuery {
    pub intersection: Vec<TagExtId>,
    pub union: Vec<TagExtId>,
    pub exclusion: Vec<TagExtId>,
    pub limit: Option<usize>,
}

/// The result of resolving a [`NameQuery`] against a catalog.
pub struct ResolvedQuery {
    pub query: Query,
    /// Set when any name in `intersection` failed to resolve — per §4.4
    /// step 1 this forces `R(Q) = ∅` regardless of `O`/`X`.
    pub unresolved_intersection: bool,
}

/// Resolve `names` against `catalog`. Unknown names in `intersection`
/// set [`ResolvedQuery::unresolved_intersection`]; unknown names in
/// `union`/`exclusion` are silently dropped (they contribute the empty
/// set, per §4.4 step 1).
pub fn resolve(catalog: &Catalog, names: &NameQuery) -> ResolvedQuery {
    let mut unresolved_intersection = false;
    let mut intersection = BTreeSet::new();
    for name in &names.intersection {
        match catalog.lookup_tag(name) {
            Some(id) => {
                intersection.insert(id);
            }
            None => unresolved_intersection = true,
        }
    }
    let union = names
        .union
        .iter()
        .filter_map(|n| catalog.lookup_tag(n))
        .collect();
    let exclusion = names
        .exclusion
        .iter()
        .filter_map(|n| catalog.lookup_tag(n))
        .collect();

    ResolvedQuery {
        query: Query {
            intersection,
            union,
            exclusion,
            limit: names.limit,
        },
        unresolved_intersection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagengine_core::TagType;

    #[test]
    fn unknown_intersection_tag_sets_flag() {
        let catalog = Catalog::in_memory();
        let names = NameQuery {
            intersection: vec![TagExtId::new("ghost")],
            ..Default::default()
        };
        let resolved = resolve(&catalog, &names);
        assert!(resolved.unresolved_intersection);
    }

    #[test]
    fn unknown_union_tag_is_dropped_not_flagged() {
        let catalog = Catalog::in_memory();
        catalog
            .intern_tag(&TagExtId::new("red"), TagType::User)
            .unwrap();
        let names = NameQuery {
            union: vec![TagExtId::new("red"), TagExtId::new("ghost")],
            ..Default::default()
        };
        let resolved = resolve(&catalog, &names);
        assert!(!resolved.unresolved_intersection);
        assert_eq!(resolved.query.union.len(), 1);
    }
}

//! Property-based equivalence, isolation, and idempotence tests (§8:
//! P1, P2, P4, P9), comparing the bitmap-backed engine against a naive
//! `HashMap<CardExtId, HashSet<TagExtId>>` reference model over randomly
//! generated small workspaces.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::collection::vec as pvec;
use proptest::prelude::*;

use tagengine_core::{CardExtId, CardMutation, QueryOptions, TagExtId};
use tagengine_engine::{NameQuery, WorkspaceEngine};
use tagengine_storage::{BitmapStore, MemBitmapStore};

const CARD_NAMES: usize = 30;
const TAG_NAMES: usize = 8;

fn engine() -> WorkspaceEngine {
    WorkspaceEngine::new(Arc::new(MemBitmapStore::new()), 1 << 20, 64, 2, None).unwrap()
}

fn card_name(i: usize) -> CardExtId {
    CardExtId::new(format!("card-{i}"))
}

fn tag_name(i: usize) -> TagExtId {
    TagExtId::new(format!("tag-{i}"))
}

/// A random small universe: for each card index, the set of tag indices
/// assigned to it (possibly empty).
fn universe_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    pvec(
        pvec(0..TAG_NAMES, 0..=4).prop_map(|mut v| {
            v.sort_unstable();
            v.dedup();
            v
        }),
        1..=CARD_NAMES,
    )
}

/// A random query: small subsets of tag indices for I/O/X. Indices may
/// exceed `TAG_NAMES` sometimes is not needed here since every tag name
/// referenced is always interned into the catalog by virtue of the
/// universe construction (even if assigned to zero cards, `RenameTag`-
/// style absence is covered separately by the blackbox boundary tests).
fn query_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<usize>, Vec<usize>)> {
    (
        pvec(0..TAG_NAMES, 0..=3),
        pvec(0..TAG_NAMES, 0..=3),
        pvec(0..TAG_NAMES, 0..=3),
    )
}

fn reference_result(
    model: &HashMap<CardExtId, HashSet<usize>>,
    insertion_order: &[CardExtId],
    i: &HashSet<usize>,
    o: &HashSet<usize>,
    x: &HashSet<usize>,
) -> Vec<CardExtId> {
    insertion_order
        .iter()
        .filter(|card| {
            let tags = &model[*card];
            let matches_i = i.iter().all(|t| tags.contains(t));
            let matches_o = o.is_empty() || o.iter().any(|t| tags.contains(t));
            let matches_x = x.iter().all(|t| !tags.contains(t));
            matches_i && matches_o && matches_x
        })
        .cloned()
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// P1: for every randomly generated workspace and query, the bitmap
    /// engine's result set matches a naive set-based reference model.
    #[test]
    fn p1_equivalence_to_reference_semantics(
        universe in universe_strategy(),
        (i, o, x) in query_strategy(),
    ) {
        let engine = engine();
        let ws = tagengine_core::WorkspaceId::new("w");

        let mut model: HashMap<CardExtId, HashSet<usize>> = HashMap::new();
        let mut insertion_order = Vec::new();
        for (idx, tags) in universe.iter().enumerate() {
            let card = card_name(idx);
            let mutation = CardMutation::UpsertCard {
                card_ext_id: card.clone(),
                tags: tags.iter().map(|t| tag_name(*t)).collect(),
            };
            engine.ingest_batch(&ws, std::slice::from_ref(&mutation)).unwrap();
            model.insert(card.clone(), tags.iter().copied().collect());
            insertion_order.push(card);
        }

        let names = NameQuery {
            intersection: i.iter().map(|t| tag_name(*t)).collect(),
            union: o.iter().map(|t| tag_name(*t)).collect(),
            exclusion: x.iter().map(|t| tag_name(*t)).collect(),
            limit: None,
        };
        let result = engine.query(&ws, &names, &QueryOptions::default()).unwrap();

        let expected = reference_result(
            &model,
            &insertion_order,
            &i.into_iter().collect(),
            &o.into_iter().collect(),
            &x.into_iter().collect(),
        );
        prop_assert_eq!(result.ids, expected);
    }

    /// P4: applying the same `upsert_card` batch twice is a no-op the
    /// second time — same tag bitmaps, same bitmap versions.
    #[test]
    fn p4_duplicate_upsert_is_idempotent(
        universe in universe_strategy(),
    ) {
        let engine = engine();
        let ws = tagengine_core::WorkspaceId::new("w");

        let mutations: Vec<CardMutation> = universe
            .iter()
            .enumerate()
            .map(|(idx, tags)| CardMutation::UpsertCard {
                card_ext_id: card_name(idx),
                tags: tags.iter().map(|t| tag_name(*t)).collect(),
            })
            .collect();

        engine.ingest_batch(&ws, &mutations).unwrap();
        let before = engine.introspect(&ws).unwrap();

        engine.ingest_batch(&ws, &mutations).unwrap();
        let after = engine.introspect(&ws).unwrap();

        prop_assert_eq!(before.store_stats.total_cardinality, after.store_stats.total_cardinality);
        prop_assert_eq!(before.tag_count, after.tag_count);
        prop_assert_eq!(before.card_count, after.card_count);
    }
}

/// P2: two workspaces built from independently generated universes never
/// observe each other's cards, however their tag names collide.
#[test]
fn p2_workspace_isolation_under_shared_tag_names() {
    let engine = engine();
    let w1 = tagengine_core::WorkspaceId::new("w1");
    let w2 = tagengine_core::WorkspaceId::new("w2");

    engine
        .ingest_batch(
            &w1,
            &[CardMutation::UpsertCard {
                card_ext_id: CardExtId::new("w1-only"),
                tags: vec![tag_name(0)],
            }],
        )
        .unwrap();
    engine
        .ingest_batch(
            &w2,
            &[CardMutation::UpsertCard {
                card_ext_id: CardExtId::new("w2-only"),
                tags: vec![tag_name(0)],
            }],
        )
        .unwrap();

    let names = NameQuery {
        intersection: vec![tag_name(0)],
        ..Default::default()
    };
    let r1 = engine.query(&w1, &names, &QueryOptions::default()).unwrap();
    let r2 = engine.query(&w2, &names, &QueryOptions::default()).unwrap();

    assert_eq!(r1.ids, vec![CardExtId::new("w1-only")]);
    assert_eq!(r2.ids, vec![CardExtId::new("w2-only")]);
}

/// P9: repeated mutation batches touching the same tag never observe a
/// decreasing bitmap version.
#[test]
fn p9_versions_are_monotonic_across_mutations() {
    let store = Arc::new(MemBitmapStore::new());
    let engine = WorkspaceEngine::new(store.clone(), 1 << 20, 64, 2, None).unwrap();
    let ws = tagengine_core::WorkspaceId::new("w");

    let mut last_version = None;
    for i in 0..20 {
        engine
            .ingest_batch(
                &ws,
                &[CardMutation::UpsertCard {
                    card_ext_id: card_name(i % 5),
                    tags: vec![tag_name(0), tag_name(i % 3)],
                }],
            )
            .unwrap();
        let tag_id = {
            let state = engine.workspace(&ws).unwrap();
            state.catalog.lookup_tag(&tag_name(0)).unwrap()
        };
        let record = store.get(&ws, tag_id).unwrap();
        if let Some(prev) = last_version {
            assert!(record.version >= prev, "version must never decrease");
        }
        last_version = Some(record.version);
    }
}

//! Black box tests for tagengine.
//!
//! These tests only use the public API — no internal crate access.
//! Each one reproduces one of the literal end-to-end scenarios from the
//! engine's specification, by external card/tag name and expected
//! `ResultSet` shape.

#[cfg(test)]
mod tests {
    use tagengine::{CardExtId, CardMutation, Config, Engine, NameQuery, QueryOptions, TagExtId};

    fn upsert(card: &str, tags: &[&str]) -> CardMutation {
        CardMutation::UpsertCard {
            card_ext_id: CardExtId::new(card),
            tags: tags.iter().map(|t| TagExtId::new(*t)).collect(),
        }
    }

    fn ids(names: &[&str]) -> Vec<CardExtId> {
        names.iter().map(|n| CardExtId::new(*n)).collect()
    }

    fn query(i: &[&str], o: &[&str], x: &[&str]) -> NameQuery {
        NameQuery {
            intersection: i.iter().map(|t| TagExtId::new(*t)).collect(),
            union: o.iter().map(|t| TagExtId::new(*t)).collect(),
            exclusion: x.iter().map(|t| TagExtId::new(*t)).collect(),
            limit: None,
        }
    }

    fn s1_universe(handle: &tagengine::Handle) {
        handle
            .ingest_batch(&[
                upsert("c1", &["red", "small"]),
                upsert("c2", &["red", "large"]),
                upsert("c3", &["blue", "small"]),
            ])
            .unwrap();
    }

    #[test]
    fn scenario_s1_basic_and() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let result = w1
            .query(&query(&["red", "small"], &[], &[]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.ids, ids(&["c1"]));
        assert_eq!(result.total, 1);
        assert!(!result.truncated);
    }

    #[test]
    fn scenario_s2_or_within_restricted_universe() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);
        w1.ingest_batch(&[upsert("c4", &["red", "medium"])]).unwrap();

        let result = w1
            .query(
                &query(&["red"], &["small", "medium"], &[]),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result.ids, ids(&["c1", "c4"]));
        assert_eq!(result.total, 2);
        assert!(!result.truncated);
    }

    #[test]
    fn scenario_s3_exclusion() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);
        w1.ingest_batch(&[upsert("c4", &["red", "medium"])]).unwrap();

        let result = w1
            .query(&query(&[], &[], &["blue"]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.ids, ids(&["c1", "c2", "c4"]));
        assert_eq!(result.total, 3);
    }

    #[test]
    fn scenario_s4_tombstone_invisibility() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);
        w1.ingest_batch(&[upsert("c4", &["red", "medium"])]).unwrap();

        w1.ingest_batch(&[CardMutation::DeleteCard {
            card_ext_id: CardExtId::new("c2"),
        }])
        .unwrap();

        let result = w1
            .query(&query(&["red"], &[], &[]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.ids, ids(&["c1", "c4"]));
        assert_eq!(result.total, 2);
    }

    #[test]
    fn scenario_s5_mutation_invalidates_cached_result() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let q = query(&["red"], &[], &[]);
        let warm = w1.query(&q, &QueryOptions::default()).unwrap();
        assert_eq!(warm.ids, ids(&["c1", "c2"]));

        w1.ingest_batch(&[upsert("c5", &["red", "small"])]).unwrap();

        let fresh = w1.query(&q, &QueryOptions::default()).unwrap();
        assert_eq!(fresh.ids, ids(&["c1", "c2", "c5"]));
        assert_eq!(fresh.total, 3);
        assert_ne!(fresh.fingerprint, warm.fingerprint);
    }

    #[test]
    fn scenario_s6_workspace_isolation() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let w2 = engine.open_workspace("w2").unwrap();
        w2.ingest_batch(&[upsert("c1", &["red"])]).unwrap();

        let result_w2 = w2
            .query(
                &query(&["red", "small"], &[], &[]),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result_w2.ids, ids(&["c1"]));
        assert_eq!(result_w2.total, 1);

        let result_w1 = w1
            .query(
                &query(&["red", "small"], &[], &[]),
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(result_w1.ids, ids(&["c1"]));
        assert_eq!(result_w1.total, 1);
    }

    #[test]
    fn boundary_b1_empty_query_returns_all_live_cards() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let result = w1.query(&query(&[], &[], &[]), &QueryOptions::default()).unwrap();
        assert_eq!(result.total, 3);
        assert!(!result.truncated);
    }

    #[test]
    fn boundary_b2_unknown_tag_in_intersection_is_empty() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let result = w1
            .query(&query(&["purple"], &[], &[]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.total, 0);
        assert!(result.ids.is_empty());
    }

    #[test]
    fn boundary_b3_unknown_sole_union_tag_behaves_as_empty_union() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        // O = {"purple"} is unknown and the only union tag, so Phase 2
        // is skipped entirely and the result is just I = {"red"}.
        let result = w1
            .query(&query(&["red"], &["purple"], &[]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.ids, ids(&["c1", "c2"]));
        assert_eq!(result.total, 2);
    }

    #[test]
    fn boundary_b5_limit_greater_than_total_is_not_truncated() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let mut q = query(&["red"], &[], &[]);
        q.limit = Some(1000);
        let result = w1.query(&q, &QueryOptions::default()).unwrap();
        assert_eq!(result.ids, ids(&["c1", "c2"]));
        assert_eq!(result.total, 2);
        assert!(!result.truncated);
    }

    #[test]
    fn boundary_b4_limit_zero_reports_total_without_ids() {
        let engine = Engine::open(Config::in_memory()).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        s1_universe(&w1);

        let mut q = query(&["red"], &[], &[]);
        q.limit = Some(0);
        let result = w1.query(&q, &QueryOptions::default()).unwrap();
        assert!(result.ids.is_empty());
        assert_eq!(result.total, 2);
        assert!(result.truncated);
    }

    #[test]
    fn persistent_engine_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = Engine::open(Config::persistent(dir.path())).unwrap();
            let w1 = engine.open_workspace("w1").unwrap();
            s1_universe(&w1);
        }
        let engine = Engine::open(Config::persistent(dir.path())).unwrap();
        let w1 = engine.open_workspace("w1").unwrap();
        let result = w1
            .query(&query(&["red", "small"], &[], &[]), &QueryOptions::default())
            .unwrap();
        assert_eq!(result.ids, ids(&["c1"]));
    }
}

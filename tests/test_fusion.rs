//! Fusion engine properties over many generated rankings

use rankfuse::retrieval::{
    reciprocal_rank_fusion, FusedEntry, FusionConfig, RankedList, Subsystem,
};
use std::collections::BTreeSet;

/// Small deterministic generator so runs are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    /// Distinct ids drawn from a pool of `pool` documents
    fn ranking(&mut self, pool: u64, len: usize) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();
        while ids.len() < len && (seen.len() as u64) < pool {
            let id = format!("doc{:03}", self.next() % pool);
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        ids
    }
}

fn list(subsystem: Subsystem, ids: &[String]) -> RankedList {
    RankedList::from_ids(subsystem, ids.iter().map(String::as_str)).unwrap()
}

fn ids(fused: &[FusedEntry]) -> Vec<&str> {
    fused.iter().map(|f| f.document_id.as_str()).collect()
}

#[test]
fn test_reference_scenario() {
    let lists = vec![
        RankedList::from_ids(Subsystem::Lexical, vec!["doc1", "doc2", "doc3"]).unwrap(),
        RankedList::from_ids(Subsystem::Vector, vec!["doc2", "doc3", "doc4"]).unwrap(),
    ];

    let fused = reciprocal_rank_fusion(&lists, &FusionConfig::default()).unwrap();

    assert_eq!(ids(&fused), vec!["doc2", "doc3", "doc1", "doc4"]);

    let rounded: Vec<f64> = fused
        .iter()
        .map(|f| (f.fused_score * 1e5).round() / 1e5)
        .collect();
    assert_eq!(rounded, vec![0.03252, 0.03200, 0.01639, 0.01587]);
}

#[test]
fn test_list_order_does_not_matter() {
    let mut rng = Lcg(7);
    let config = FusionConfig::default().with_limit(50);

    for _ in 0..50 {
        let lexical = list(Subsystem::Lexical, &rng.ranking(40, 20));
        let vector = list(Subsystem::Vector, &rng.ranking(40, 20));

        let forward = reciprocal_rank_fusion(&[lexical.clone(), vector.clone()], &config).unwrap();
        let backward = reciprocal_rank_fusion(&[vector, lexical], &config).unwrap();

        // Bit-identical, not just approximately equal
        assert_eq!(forward, backward);
    }
}

#[test]
fn test_single_list_keeps_its_order() {
    let mut rng = Lcg(11);

    for _ in 0..20 {
        let ranking = rng.ranking(100, 30);
        let config = FusionConfig::default().with_limit(ranking.len());

        let fused = reciprocal_rank_fusion(&[list(Subsystem::Vector, &ranking)], &config).unwrap();

        let fused_ids: Vec<String> = fused.iter().map(|f| f.document_id.to_string()).collect();
        assert_eq!(fused_ids, ranking);
        for (position, entry) in fused.iter().enumerate() {
            assert_eq!(entry.rank_in(Subsystem::Vector), Some(position + 1));
            assert_eq!(entry.rank_in(Subsystem::Lexical), None);
        }
    }
}

#[test]
fn test_output_is_union_of_inputs() {
    let mut rng = Lcg(23);
    let config = FusionConfig::default().with_limit(1_000);

    for _ in 0..30 {
        let lexical = rng.ranking(30, 15);
        let vector = rng.ranking(30, 15);

        let fused = reciprocal_rank_fusion(
            &[list(Subsystem::Lexical, &lexical), list(Subsystem::Vector, &vector)],
            &config,
        )
        .unwrap();

        let expected: BTreeSet<&str> = lexical
            .iter()
            .chain(vector.iter())
            .map(String::as_str)
            .collect();
        let actual: BTreeSet<&str> = ids(&fused).into_iter().collect();
        assert_eq!(actual, expected);
        assert_eq!(fused.len(), expected.len());

        for entry in &fused {
            let in_lexical = lexical.iter().any(|id| id == entry.document_id.as_str());
            let in_vector = vector.iter().any(|id| id == entry.document_id.as_str());
            assert_eq!(entry.rank_in(Subsystem::Lexical).is_some(), in_lexical);
            assert_eq!(entry.rank_in(Subsystem::Vector).is_some(), in_vector);
        }
    }
}

#[test]
fn test_repeated_calls_are_identical() {
    let mut rng = Lcg(42);
    let lists = vec![
        list(Subsystem::Lexical, &rng.ranking(25, 25)),
        list(Subsystem::Vector, &rng.ranking(25, 25)),
    ];
    let config = FusionConfig::default();

    let first = reciprocal_rank_fusion(&lists, &config).unwrap();
    for _ in 0..10 {
        assert_eq!(reciprocal_rank_fusion(&lists, &config).unwrap(), first);
    }
}

#[test]
fn test_output_sorted_with_id_tie_break() {
    let mut rng = Lcg(99);
    let config = FusionConfig::default().with_limit(100);

    for _ in 0..30 {
        let fused = reciprocal_rank_fusion(
            &[
                list(Subsystem::Lexical, &rng.ranking(20, 10)),
                list(Subsystem::Vector, &rng.ranking(20, 10)),
            ],
            &config,
        )
        .unwrap();

        for pair in fused.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.fused_score > b.fused_score
                    || (a.fused_score == b.fused_score && a.document_id < b.document_id)
            );
        }
    }
}

#[test]
fn test_smaller_limit_is_prefix() {
    let mut rng = Lcg(5);
    let lists = vec![
        list(Subsystem::Lexical, &rng.ranking(50, 30)),
        list(Subsystem::Vector, &rng.ranking(50, 30)),
    ];

    let full = reciprocal_rank_fusion(&lists, &FusionConfig::default().with_limit(100)).unwrap();
    for limit in [1, 5, 10, 25] {
        let partial =
            reciprocal_rank_fusion(&lists, &FusionConfig::default().with_limit(limit)).unwrap();
        assert_eq!(partial.len(), limit.min(full.len()));
        assert_eq!(partial[..], full[..partial.len()]);
    }
}

#[test]
fn test_zero_k_is_valid() {
    let config = FusionConfig::new(0.0, 10).unwrap();
    let lists = vec![
        RankedList::from_ids(Subsystem::Lexical, vec!["a", "b"]).unwrap(),
        RankedList::from_ids(Subsystem::Vector, vec!["b"]).unwrap(),
    ];

    let fused = reciprocal_rank_fusion(&lists, &config).unwrap();
    assert_eq!(ids(&fused), vec!["b", "a"]);
    assert_eq!(fused[0].fused_score, 1.5);
    assert_eq!(fused[1].fused_score, 1.0);
}

#[test]
fn test_zero_limit_is_rejected() {
    assert!(FusionConfig::new(60.0, 0).is_err());

    let lists = vec![RankedList::from_ids(Subsystem::Lexical, vec!["a"]).unwrap()];
    let config = FusionConfig::default().with_limit(0);
    assert!(reciprocal_rank_fusion(&lists, &config).is_err());
}

#[test]
fn test_weights_shift_the_winner() {
    let lists = vec![
        RankedList::from_ids(Subsystem::Lexical, vec!["keyword-hit", "both"]).unwrap(),
        RankedList::from_ids(Subsystem::Vector, vec!["semantic-hit", "both"]).unwrap(),
    ];

    let base = FusionConfig::new(1.0, 10).unwrap();

    let lexical_heavy = base.clone().with_weight(Subsystem::Lexical, 3.0);
    let fused = reciprocal_rank_fusion(&lists, &lexical_heavy).unwrap();
    assert_eq!(fused[0].document_id.as_str(), "keyword-hit");

    let vector_heavy = base.with_weight(Subsystem::Vector, 3.0);
    let fused = reciprocal_rank_fusion(&lists, &vector_heavy).unwrap();
    assert_eq!(fused[0].document_id.as_str(), "semantic-hit");
}

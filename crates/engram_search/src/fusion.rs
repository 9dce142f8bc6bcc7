//! Reciprocal Rank Fusion and duplicate collapsing.
//!
//! Pure rank arithmetic: `score(doc) = Σ_v 1/(k + rank_v(doc))`, summed
//! over the variants the document appears in. Documents are keyed by their
//! stable id across sources.

use engram_protocol::SearchCandidate;
use std::collections::{HashMap, HashSet};

/// Standard RRF constant from the literature.
pub const RRF_K: f64 = 60.0;

/// Collapse duplicate ids within one candidate list, keeping the
/// highest-scoring instance of each document. Output is sorted by score
/// descending.
pub fn dedup_highest_score(candidates: Vec<SearchCandidate>) -> Vec<SearchCandidate> {
    let mut sorted = candidates;
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen: HashSet<String> = HashSet::with_capacity(sorted.len());
    let mut unique = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        if seen.insert(candidate.id.clone()) {
            unique.push(candidate);
        }
    }
    unique
}

/// Merge per-variant ranked lists with Reciprocal Rank Fusion.
///
/// Each list is assumed already ranked (rank 1 first). The first variant
/// that surfaces a document contributes its payload; later variants only
/// add rank mass. A single-variant fuse preserves the input order.
pub fn fuse_variants(variant_results: Vec<Vec<SearchCandidate>>, k: f64) -> Vec<SearchCandidate> {
    let mut fused: HashMap<String, SearchCandidate> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for results in variant_results {
        for (index, candidate) in results.into_iter().enumerate() {
            let rank = (index + 1) as f64;
            let rrf = 1.0 / (k + rank);
            match fused.get_mut(&candidate.id) {
                Some(existing) => existing.score += rrf,
                None => {
                    order.push(candidate.id.clone());
                    fused.insert(
                        candidate.id.clone(),
                        SearchCandidate {
                            score: rrf,
                            ..candidate
                        },
                    );
                }
            }
        }
    }

    // Stable on ties: first-surfaced document wins.
    let mut merged: Vec<SearchCandidate> = order
        .into_iter()
        .filter_map(|id| fused.remove(&id))
        .collect();
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_protocol::SourceType;
    use serde_json::json;

    fn candidate(id: i64, score: f64) -> SearchCandidate {
        SearchCandidate::new(SourceType::Insight, id, score, json!({"id": id}))
    }

    #[test]
    fn dedup_keeps_highest_scoring_instance() {
        let results = vec![
            candidate(1, 0.85),
            candidate(2, 0.75),
            candidate(1, 0.90),
            candidate(3, 0.65),
            candidate(2, 0.70),
        ];
        let unique = dedup_highest_score(results);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].id, "insight:1");
        assert!((unique[0].score - 0.90).abs() < 1e-12);
        assert_eq!(unique[1].id, "insight:2");
        assert!((unique[1].score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn single_variant_preserves_order() {
        let results = vec![candidate(1, 0.9), candidate(2, 0.8), candidate(3, 0.7)];
        let fused = fuse_variants(vec![results], RRF_K);
        let ids: Vec<&str> = fused.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["insight:1", "insight:2", "insight:3"]);
        // Rank 1 gets 1/61, rank 2 gets 1/62, rank 3 gets 1/63.
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused[2].score - 1.0 / 63.0).abs() < 1e-12);
    }

    #[test]
    fn overlap_accumulates_rank_mass() {
        // Variant 1: A at rank 1, B at rank 2.
        // Variant 2: B at rank 1, A at rank 3 (C holds rank 2).
        let v1 = vec![candidate(1, 0.9), candidate(2, 0.8)];
        let v2 = vec![candidate(2, 0.85), candidate(3, 0.8), candidate(1, 0.7)];
        let fused = fuse_variants(vec![v1, v2], RRF_K);

        let b = fused.iter().find(|c| c.id == "insight:2").unwrap();
        let a = fused.iter().find(|c| c.id == "insight:1").unwrap();
        assert!((b.score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((a.score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        // B accumulated more rank mass, so it places first.
        assert_eq!(fused[0].id, "insight:2");
    }

    #[test]
    fn symmetric_overlap_beats_asymmetric() {
        // A: ranks 1 and 3. B: ranks 2 and 1. score(B) > score(A).
        let v1 = vec![candidate(10, 0.9), candidate(20, 0.8)];
        let v2 = vec![candidate(20, 0.9), candidate(99, 0.85), candidate(10, 0.6)];
        let fused = fuse_variants(vec![v1, v2], 60.0);
        assert_eq!(fused[0].id, "insight:20");
        assert_eq!(fused[1].id, "insight:10");
    }

    #[test]
    fn empty_variants_fuse_to_nothing() {
        let fused = fuse_variants(vec![vec![], vec![]], RRF_K);
        assert!(fused.is_empty());
    }

    #[test]
    fn first_variant_payload_wins() {
        let mut first = candidate(5, 0.9);
        first.payload = json!({"content": "from variant one"});
        let mut second = candidate(5, 0.8);
        second.payload = json!({"content": "from variant two"});

        let fused = fuse_variants(vec![vec![first], vec![second]], RRF_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].payload["content"], "from variant one");
    }
}

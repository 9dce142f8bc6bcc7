//! Feedback re-scoring, applied lazily at query time.
//!
//! Stored feedback never triggers recomputation; the tallies are read per
//! query and folded into the fused scores for ranking only. The stored
//! `memory_strength` of an insight is never modified on this path.

use engram_db::FeedbackTally;
use engram_protocol::{SearchCandidate, SourceType};
use std::collections::HashMap;

/// Score delta per distinct feedback event.
pub const FEEDBACK_STEP: f64 = 0.1;

/// Adjust fused scores by feedback tallies and re-rank.
///
/// `helpful` adds [`FEEDBACK_STEP`] per event, `not_relevant` subtracts
/// it, `not_now` never counts. The adjusted value is clamped to [0, 1],
/// so the total movement is bounded by `events × 0.1` and the final score
/// stays in the legal range. The sort is stable: candidates with equal
/// scores keep their existing order.
pub fn apply_feedback(
    candidates: Vec<SearchCandidate>,
    tallies: &[FeedbackTally],
) -> Vec<SearchCandidate> {
    let by_insight: HashMap<i64, &FeedbackTally> =
        tallies.iter().map(|t| (t.insight_id, t)).collect();

    let mut adjusted = candidates;
    for candidate in &mut adjusted {
        if candidate.source_type != SourceType::Insight {
            continue;
        }
        let Some(row_id) = candidate.row_id() else {
            continue;
        };
        if let Some(tally) = by_insight.get(&row_id) {
            let delta = FEEDBACK_STEP * (tally.helpful - tally.not_relevant) as f64;
            candidate.score = (candidate.score + delta).clamp(0.0, 1.0);
        }
    }

    adjusted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(id: i64, score: f64) -> SearchCandidate {
        SearchCandidate::new(SourceType::Insight, id, score, json!({}))
    }

    fn tally(insight_id: i64, helpful: i64, not_relevant: i64) -> FeedbackTally {
        FeedbackTally {
            insight_id,
            helpful,
            not_relevant,
        }
    }

    #[test]
    fn two_helpful_one_not_relevant_boosts_by_a_tenth() {
        let adjusted = apply_feedback(vec![candidate(1, 0.50)], &[tally(1, 2, 1)]);
        assert!((adjusted[0].score - 0.60).abs() < 1e-12);
    }

    #[test]
    fn adjustment_is_bounded_by_event_count() {
        let before = 0.50;
        let events = 3 + 2;
        let adjusted = apply_feedback(vec![candidate(1, before)], &[tally(1, 3, 2)]);
        let moved = (adjusted[0].score - before).abs();
        assert!(moved <= events as f64 * FEEDBACK_STEP + 1e-12);
    }

    #[test]
    fn scores_clamp_to_legal_range() {
        let boosted = apply_feedback(vec![candidate(1, 0.95)], &[tally(1, 5, 0)]);
        assert!((boosted[0].score - 1.0).abs() < 1e-12);

        let floored = apply_feedback(vec![candidate(2, 0.05)], &[tally(2, 0, 5)]);
        assert!(floored[0].score.abs() < 1e-12);
    }

    #[test]
    fn not_now_has_no_effect() {
        // A tally row only carries helpful/not_relevant counts; an insight
        // with exclusively not_now feedback has no tally row at all.
        let adjusted = apply_feedback(vec![candidate(1, 0.42)], &[]);
        assert!((adjusted[0].score - 0.42).abs() < 1e-12);
    }

    #[test]
    fn reranks_after_adjustment() {
        let adjusted = apply_feedback(
            vec![candidate(1, 0.50), candidate(2, 0.45)],
            &[tally(2, 2, 0)],
        );
        assert_eq!(adjusted[0].id, "insight:2");
        assert_eq!(adjusted[1].id, "insight:1");
    }

    #[test]
    fn ties_keep_existing_order() {
        let adjusted = apply_feedback(
            vec![candidate(7, 0.5), candidate(8, 0.5), candidate(9, 0.5)],
            &[],
        );
        let ids: Vec<&str> = adjusted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["insight:7", "insight:8", "insight:9"]);
    }

    #[test]
    fn non_insight_candidates_are_untouched() {
        let graph = SearchCandidate::new(SourceType::Graph, 1, 0.3, json!({}));
        let adjusted = apply_feedback(vec![graph], &[tally(1, 5, 0)]);
        assert!((adjusted[0].score - 0.3).abs() < 1e-12);
    }
}

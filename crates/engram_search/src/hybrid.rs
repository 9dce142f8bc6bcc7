//! Hybrid search orchestration.
//!
//! One call runs the whole retrieval pipeline: filter validation, variant
//! embedding, per-source candidate generation under the access predicate,
//! RRF fusion across variants, feedback re-scoring, top-K truncation.
//! Embeddings are produced before any connection is taken, and the
//! per-source generators for one variant run concurrently.

use crate::embedding::EmbeddingGateway;
use crate::filters::validate_filters;
use crate::fusion::{dedup_highest_score, fuse_variants, RRF_K};
use crate::ief::apply_feedback;
use engram_db::{DbError, ExpansionSeeds, Session};
use engram_protocol::{
    ErrorKind, FilterOptions, FilterSpec, SearchCandidate, SearchResponse, SearchResult,
    SourceType, ToolError,
};
use pgvector::Vector;
use serde_json::json;
use tracing::{debug, error};

/// Additional semantic variants accepted beside the original query.
pub const MAX_QUERY_VARIANTS: usize = 3;

/// Result-size bounds shared with the tool boundary.
pub const DEFAULT_TOP_K: usize = 10;
pub const MAX_TOP_K: usize = 50;

/// How many fused insights seed the graph expansion.
const GRAPH_SEED_COUNT: usize = 5;

/// A hybrid search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Semantic variants supplied by the caller (the server fuses, it
    /// never generates variants).
    pub query_variants: Vec<String>,
    pub top_k: Option<usize>,
    pub filters: FilterOptions,
    /// Expand the graph around the strongest insight hits.
    pub include_graph: bool,
}

/// The retrieval pipeline, constructed once at startup.
pub struct HybridSearch {
    gateway: EmbeddingGateway,
}

impl HybridSearch {
    pub fn new(gateway: EmbeddingGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Run the full pipeline for one request.
    pub async fn run(
        &self,
        session: &Session,
        request: &SearchRequest,
    ) -> Result<SearchResponse, ToolError> {
        let top_k = validate_request(request)?;
        let spec = validate_filters(&request.filters)?;

        let mut texts: Vec<&str> = Vec::with_capacity(1 + request.query_variants.len());
        texts.push(request.query.as_str());
        texts.extend(request.query_variants.iter().map(String::as_str));

        // Embed every variant before touching the pool; connections are
        // never held across the provider call.
        let mut embeddings: Vec<Vector> = Vec::with_capacity(texts.len());
        for text in &texts {
            embeddings.push(self.gateway.embed(text).await);
        }

        let per_source_limit = (top_k * 2).max(DEFAULT_TOP_K) as i64;
        let mut variant_lists: Vec<Vec<SearchCandidate>> = Vec::with_capacity(texts.len());
        for (text, embedding) in texts.iter().zip(&embeddings) {
            let list = self
                .variant_candidates(session, text, embedding, &spec, per_source_limit)
                .await?;
            variant_lists.push(list);
        }

        if request.include_graph && spec.includes_source(SourceType::Graph) {
            for list in &mut variant_lists {
                let expanded = graph_candidates(session, list, &spec).await?;
                extend_unique(list, expanded);
            }
        }

        let variants_fused = variant_lists.len();
        let fused = fuse_variants(variant_lists, RRF_K);
        let total_candidates = fused.len();

        let insight_ids: Vec<i64> = fused
            .iter()
            .filter(|c| c.source_type == SourceType::Insight)
            .filter_map(SearchCandidate::row_id)
            .collect();
        let tallies = session
            .feedback_tallies(&insight_ids)
            .await
            .map_err(storage_error)?;

        let mut results = apply_feedback(fused, &tallies);
        results.truncate(top_k);

        debug!(
            variants = variants_fused,
            candidates = total_candidates,
            returned = results.len(),
            "hybrid search complete"
        );

        Ok(SearchResponse {
            results: results
                .into_iter()
                .map(|c| SearchResult {
                    id: c.id,
                    score: c.score,
                    source_type: c.source_type,
                    payload: c.payload,
                })
                .collect(),
            variants_fused,
            total_candidates,
        })
    }

    /// One variant's merged, deduplicated candidate list.
    async fn variant_candidates(
        &self,
        session: &Session,
        text: &str,
        embedding: &Vector,
        spec: &FilterSpec,
        limit: i64,
    ) -> Result<Vec<SearchCandidate>, ToolError> {
        let want_insights = spec.includes_source(SourceType::Insight);
        let want_episodes = spec.includes_source(SourceType::Episode);

        let (vector_hits, lexical_hits, episode_hits) = tokio::try_join!(
            run_if(want_insights, session.insight_vector_candidates(embedding, spec, limit)),
            run_if(want_insights, session.insight_lexical_candidates(text, spec, limit)),
            run_if(want_episodes, session.episode_vector_candidates(embedding, spec, limit)),
        )
        .map_err(storage_error)?;

        let mut merged = vector_hits;
        merged.extend(lexical_hits);
        merged.extend(episode_hits);
        Ok(dedup_highest_score(merged))
    }
}

/// Expand the graph around a variant's strongest insight hits and return
/// the reached edges as ranked candidates.
async fn graph_candidates(
    session: &Session,
    ranked: &[SearchCandidate],
    spec: &FilterSpec,
) -> Result<Vec<SearchCandidate>, ToolError> {
    let seeds: Vec<engram_protocol::InsightId> = ranked
        .iter()
        .filter(|c| c.source_type == SourceType::Insight)
        .filter_map(SearchCandidate::row_id)
        .take(GRAPH_SEED_COUNT)
        .map(engram_protocol::InsightId::new)
        .collect();
    if seeds.is_empty() {
        return Ok(Vec::new());
    }

    let edges = session
        .expand_neighbors(&ExpansionSeeds::Insights(seeds), 1, spec.sector)
        .await
        .map_err(storage_error)?;

    Ok(edges
        .into_iter()
        .enumerate()
        .map(|(rank, edge)| {
            SearchCandidate::new(
                SourceType::Graph,
                edge.id,
                1.0 / (rank as f64 + 2.0),
                json!({
                    "source": edge.source_name,
                    "target": edge.target_name,
                    "relation": edge.relation,
                    "memory_sector": edge.memory_sector,
                    "project_id": edge.project_id,
                }),
            )
        })
        .collect())
}

/// Append candidates whose ids are not already ranked.
fn extend_unique(list: &mut Vec<SearchCandidate>, extra: Vec<SearchCandidate>) {
    for candidate in extra {
        if !list.iter().any(|c| c.id == candidate.id) {
            list.push(candidate);
        }
    }
}

async fn run_if<F>(enabled: bool, fut: F) -> Result<Vec<SearchCandidate>, DbError>
where
    F: std::future::Future<Output = Result<Vec<SearchCandidate>, DbError>>,
{
    if enabled {
        fut.await
    } else {
        Ok(Vec::new())
    }
}

fn validate_request(request: &SearchRequest) -> Result<usize, ToolError> {
    let mut issues: Vec<String> = Vec::new();
    if request.query.trim().is_empty() {
        issues.push("query must not be empty".to_string());
    }
    if request.query_variants.len() > MAX_QUERY_VARIANTS {
        issues.push(format!(
            "at most {} query_variants are accepted",
            MAX_QUERY_VARIANTS
        ));
    }
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    if top_k == 0 || top_k > MAX_TOP_K {
        issues.push(format!("top_k must be between 1 and {}", MAX_TOP_K));
    }
    if issues.is_empty() {
        Ok(top_k)
    } else {
        Err(ToolError::validation_multi(&issues))
    }
}

fn storage_error(err: DbError) -> ToolError {
    let tool = err.to_tool_error();
    if tool.kind == ErrorKind::Fatal {
        error!(%err, "storage failure during hybrid search");
    }
    tool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            query_variants: Vec::new(),
            top_k: None,
            filters: FilterOptions::default(),
            include_graph: false,
        }
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = validate_request(&request("   ")).unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn variant_count_is_capped() {
        let mut req = request("q");
        req.query_variants = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let err = validate_request(&req).unwrap_err();
        assert!(err.message.contains("query_variants"));
    }

    #[test]
    fn top_k_defaults_and_bounds() {
        assert_eq!(validate_request(&request("q")).unwrap(), DEFAULT_TOP_K);

        let mut req = request("q");
        req.top_k = Some(0);
        assert!(validate_request(&req).is_err());

        req.top_k = Some(MAX_TOP_K + 1);
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn extend_unique_skips_ranked_ids() {
        let a = SearchCandidate::new(SourceType::Graph, 1, 0.5, serde_json::json!({}));
        let b = SearchCandidate::new(SourceType::Graph, 1, 0.4, serde_json::json!({}));
        let c = SearchCandidate::new(SourceType::Graph, 2, 0.3, serde_json::json!({}));
        let mut list = vec![a];
        extend_unique(&mut list, vec![b, c]);
        assert_eq!(list.len(), 2);
    }
}

//! End-to-end retrieval pipeline tests against a live Postgres.
//!
//! Uses the deterministic embedder so rankings are reproducible without a
//! provider key. Set `TEST_DATABASE_URL` to run; each test skips
//! otherwise.

use engram_db::{DbConfig, EngramDb};
use engram_protocol::{AccessLevel, Actor, FeedbackType, FilterOptions, RolloutPhase, SourceType};
use engram_search::{
    DeterministicEmbedder, EmbeddingConfig, EmbeddingGateway, HybridSearch, SearchRequest,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

static UNIQUE: AtomicU32 = AtomicU32::new(0);

fn pid(tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!(
        "p{}_{}_{}_{}",
        tag,
        std::process::id(),
        nanos,
        UNIQUE.fetch_add(1, Ordering::Relaxed)
    )
}

async fn setup(tag: &str) -> Option<(EngramDb, HybridSearch, String)> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return None;
        }
    };
    let db = EngramDb::connect(DbConfig::new(url)).await.expect("connect");
    db.migrate().await.expect("migrate");

    let project = pid(tag);
    db.register_project(&project, "pipeline test", AccessLevel::Isolated)
        .await
        .expect("register");
    db.set_rollout_phase(&project, RolloutPhase::Enforcing, true)
        .await
        .expect("phase");

    let search = HybridSearch::new(EmbeddingGateway::from_config(EmbeddingConfig::default()));
    Some((db, search, project))
}

fn request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        query_variants: Vec::new(),
        top_k: Some(10),
        filters: FilterOptions::default(),
        include_graph: false,
    }
}

async fn store(db: &EngramDb, project: &str, content: &str, tags: &[&str]) -> i64 {
    let session = db.session(Some(project)).await.unwrap();
    let embedding = DeterministicEmbedder.embed(content);
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    session
        .store_insight(content, embedding, &[], json!({}), &tags, 0.5)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn identical_text_ranks_first() {
    let Some((db, search, project)) = setup("rank").await else { return };
    let target = store(&db, &project, "rust ownership and borrowing", &[]).await;
    store(&db, &project, "completely unrelated grocery list", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    let response = search
        .run(&session, &request("rust ownership and borrowing"))
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    assert_eq!(response.variants_fused, 1);
    assert_eq!(response.results[0].id, format!("insight:{}", target));
    assert_eq!(response.results[0].source_type, SourceType::Insight);
}

#[tokio::test]
async fn variants_are_fused_and_deduplicated() {
    let Some((db, search, project)) = setup("fuse").await else { return };
    let target = store(&db, &project, "asynchronous task cancellation", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    let mut req = request("asynchronous task cancellation");
    req.query_variants = vec![
        "cancelling async tasks".to_string(),
        "task cancellation semantics".to_string(),
    ];
    let response = search.run(&session, &req).await.unwrap();

    assert_eq!(response.variants_fused, 3);
    let occurrences = response
        .results
        .iter()
        .filter(|r| r.id == format!("insight:{}", target))
        .count();
    assert_eq!(occurrences, 1, "one fused entry per stable id");
}

#[tokio::test]
async fn soft_deleted_insights_never_surface() {
    let Some((db, search, project)) = setup("softdel").await else { return };
    let doomed = store(&db, &project, "ephemeral fact about penguins", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    session
        .soft_delete_insight(
            engram_protocol::InsightId::new(doomed),
            Actor::Io,
            "obsolete",
        )
        .await
        .unwrap();

    let response = search
        .run(&session, &request("ephemeral fact about penguins"))
        .await
        .unwrap();
    assert!(
        !response
            .results
            .iter()
            .any(|r| r.id == format!("insight:{}", doomed)),
        "deleted insight leaked into search"
    );
}

#[tokio::test]
async fn helpful_feedback_boosts_ranking_on_the_next_query() {
    let Some((db, search, project)) = setup("ief").await else { return };
    let boosted = store(&db, &project, "shared topic alpha variant", &[]).await;
    store(&db, &project, "shared topic beta variant", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    for _ in 0..3 {
        session
            .submit_feedback(
                engram_protocol::InsightId::new(boosted),
                FeedbackType::Helpful,
                None,
            )
            .await
            .unwrap();
    }

    let response = search.run(&session, &request("shared topic")).await.unwrap();
    assert!(
        response.results.first().map(|r| r.id.as_str())
            == Some(format!("insight:{}", boosted).as_str()),
        "three helpful events outweigh any fused-rank difference"
    );
}

#[tokio::test]
async fn tags_filter_restricts_and_empty_tags_do_not() {
    let Some((db, search, project)) = setup("tags").await else { return };
    let tagged = store(&db, &project, "notes on lifetimes", &["rust"]).await;
    store(&db, &project, "notes on gardening", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();

    let mut req = request("notes");
    req.filters.tags_filter = Some(vec!["rust".to_string()]);
    let filtered = search.run(&session, &req).await.unwrap();
    assert!(filtered
        .results
        .iter()
        .all(|r| r.id == format!("insight:{}", tagged)));

    let mut req = request("notes");
    req.filters.tags_filter = Some(vec![]);
    let unfiltered = search.run(&session, &req).await.unwrap();
    assert!(unfiltered.results.len() >= 2, "empty tag list is a no-op");
}

#[tokio::test]
async fn graph_expansion_adds_edge_results() {
    let Some((db, search, project)) = setup("graph").await else { return };
    let seed = store(&db, &project, "distributed consensus overview", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    session
        .add_node(
            "consensus",
            "concept",
            json!({}),
            Some(engram_protocol::InsightId::new(seed)),
        )
        .await
        .unwrap();
    session
        .add_node("raft", "concept", json!({}), None)
        .await
        .unwrap();
    session
        .add_edge("consensus", "raft", "RELATES_TO", None, json!({}))
        .await
        .unwrap();

    let mut req = request("distributed consensus overview");
    req.include_graph = true;
    let response = search.run(&session, &req).await.unwrap();

    let graph_hits: Vec<_> = response
        .results
        .iter()
        .filter(|r| r.source_type == SourceType::Graph)
        .collect();
    assert!(!graph_hits.is_empty(), "graph expansion contributed edges");
    assert_eq!(graph_hits[0].payload["memory_sector"], "semantic");
}

#[tokio::test]
async fn source_type_filter_prunes_generators() {
    let Some((db, search, project)) = setup("srcs").await else { return };
    store(&db, &project, "episodic exclusion check", &[]).await;

    let session = db.session(Some(&project)).await.unwrap();
    let embedding = DeterministicEmbedder.embed("an episode body");
    session
        .add_episode("an episode body", embedding, json!({}))
        .await
        .unwrap();

    let mut req = request("episodic exclusion check");
    req.filters.source_type_filter = Some(vec!["insight".to_string()]);
    let response = search.run(&session, &req).await.unwrap();
    assert!(response
        .results
        .iter()
        .all(|r| r.source_type == SourceType::Insight));
}

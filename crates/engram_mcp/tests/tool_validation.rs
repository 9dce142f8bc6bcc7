//! Tool-boundary tests that need no database: request validation runs
//! before any storage access, so a lazily-connected pool never dials out.

use engram_db::{DbConfig, EngramDb};
use engram_mcp::state::ServerState;
use engram_mcp::tools;
use engram_search::{EmbeddingConfig, EmbeddingGateway, HybridSearch};
use serde_json::json;

fn state() -> ServerState {
    let db = EngramDb::connect_lazy(DbConfig::new("postgres://localhost:1/engram_unused"))
        .expect("lazy pool");
    let search = HybridSearch::new(EmbeddingGateway::from_config(EmbeddingConfig::default()));
    ServerState::new(db, search, None)
}

#[tokio::test]
async fn delete_insight_reports_every_missing_field() {
    let err = tools::dispatch("delete_insight", &state(), json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("insight_id is required"));
    assert!(err.message.contains("actor is required"));
    assert!(err.message.contains("reason is required"));
}

#[tokio::test]
async fn delete_insight_rejects_bad_actor_and_id_together() {
    let err = tools::dispatch(
        "delete_insight",
        &state(),
        json!({"insight_id": -1, "actor": "io", "reason": ""}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("positive integer"));
    assert!(err.message.contains("actor must be one of"));
    assert!(err.message.contains("reason is required"));
}

#[tokio::test]
async fn update_insight_requires_a_change() {
    let err = tools::dispatch(
        "update_insight",
        &state(),
        json!({"insight_id": 5, "actor": "I/O", "reason": "tweak"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("at least one of"));
}

#[tokio::test]
async fn hybrid_search_validates_filters_before_any_io() {
    let err = tools::dispatch(
        "hybrid_search",
        &state(),
        json!({
            "query": "anything",
            "date_from": "2025-06-02T00:00:00Z",
            "date_to": "2025-06-01T00:00:00Z",
            "source_type_filter": ["bogus"],
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("date_from must be <= date_to"));
    assert!(err.message.contains("bogus"));
}

#[tokio::test]
async fn hybrid_search_caps_query_variants() {
    let err = tools::dispatch(
        "hybrid_search",
        &state(),
        json!({"query": "q", "query_variants": ["a", "b", "c", "d"]}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("query_variants"));
}

#[tokio::test]
async fn feedback_type_is_a_closed_set() {
    let err = tools::dispatch(
        "submit_insight_feedback",
        &state(),
        json!({"insight_id": 1, "feedback_type": "amazing"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("helpful, not_relevant, not_now"));
}

#[tokio::test]
async fn unknown_tool_is_a_structured_validation_error() {
    let err = tools::dispatch("no_such_tool", &state(), json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), 400);
    assert_eq!(err.field.as_deref(), Some("name"));
}

#[tokio::test]
async fn expand_graph_depth_is_bounded() {
    let err = tools::dispatch(
        "expand_graph",
        &state(),
        json!({"node_names": ["alpha"], "depth": 9}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.message.contains("depth must be between 1 and 3"));
}

#[tokio::test]
async fn envelope_shape_matches_the_wire_contract() {
    let err = tools::dispatch("delete_insight", &state(), json!({}))
        .await
        .unwrap_err();
    let envelope = serde_json::to_value(err.to_envelope()).unwrap();
    assert_eq!(envelope["error"]["code"], 400);
    assert!(envelope["error"]["message"].is_string());
}

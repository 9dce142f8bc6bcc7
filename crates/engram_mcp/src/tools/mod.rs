//! Tool implementations.
//!
//! Each tool deserializes its typed request, validates every field at
//! once, and returns either a result object or the structured error
//! envelope. Tools are advertised by `definitions()` and dispatched by
//! name.

mod context;
mod graph;
mod insights;
mod proposals;
mod search;
mod stats;

use crate::protocol::ToolDefinition;
use crate::state::ServerState;
use engram_protocol::ToolError;
use serde_json::{json, Value};

/// Every tool the server advertises.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "set_project_context",
            "Set the session's current project; all reads and writes are scoped by it",
            json!({
                "type": "object",
                "properties": {
                    "project_id": {"type": "string"}
                },
                "required": ["project_id"]
            }),
        ),
        tool(
            "store_insight",
            "Store a new insight under the current project (content is embedded server-side)",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string"},
                    "source_ids": {"type": "array", "items": {"type": "integer"}},
                    "metadata": {"type": "object"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "memory_strength": {"type": "number", "minimum": 0, "maximum": 1}
                },
                "required": ["content"]
            }),
        ),
        tool(
            "hybrid_search",
            "Hybrid semantic+lexical search with RRF fusion over query variants, \
             optional graph expansion, and feedback-adjusted ranking",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "query_variants": {"type": "array", "items": {"type": "string"}, "maxItems": 3},
                    "top_k": {"type": "integer", "minimum": 1, "maximum": 50},
                    "tags_filter": {"type": "array", "items": {"type": "string"}},
                    "date_from": {"type": "string", "format": "date-time"},
                    "date_to": {"type": "string", "format": "date-time"},
                    "source_type_filter": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["insight", "episode", "graph"]}
                    },
                    "sector_filter": {
                        "type": "string",
                        "enum": ["semantic", "episodic", "procedural", "emotional"]
                    },
                    "include_graph": {"type": "boolean"}
                },
                "required": ["query"]
            }),
        ),
        tool(
            "update_insight",
            "Update an insight's content and/or memory strength; non-privileged \
             actors record a pending proposal instead",
            json!({
                "type": "object",
                "properties": {
                    "insight_id": {"type": "integer", "minimum": 1},
                    "new_content": {"type": "string"},
                    "new_memory_strength": {"type": "number", "minimum": 0, "maximum": 1},
                    "actor": {"type": "string", "enum": ["I/O", "ethr"]},
                    "reason": {"type": "string"}
                },
                "required": ["insight_id", "actor", "reason"]
            }),
        ),
        tool(
            "delete_insight",
            "Soft-delete an insight with a revision record; non-privileged actors \
             record a pending proposal instead",
            json!({
                "type": "object",
                "properties": {
                    "insight_id": {"type": "integer", "minimum": 1},
                    "actor": {"type": "string", "enum": ["I/O", "ethr"]},
                    "reason": {"type": "string"}
                },
                "required": ["insight_id", "actor", "reason"]
            }),
        ),
        tool(
            "get_insight_history",
            "Revision history for an insight, ascending by version",
            json!({
                "type": "object",
                "properties": {
                    "insight_id": {"type": "integer", "minimum": 1}
                },
                "required": ["insight_id"]
            }),
        ),
        tool(
            "submit_insight_feedback",
            "Record feedback about a recalled insight; scores adjust lazily on the next query",
            json!({
                "type": "object",
                "properties": {
                    "insight_id": {"type": "integer", "minimum": 1},
                    "feedback_type": {"type": "string", "enum": ["helpful", "not_relevant", "not_now"]},
                    "context": {"type": "string"}
                },
                "required": ["insight_id", "feedback_type"]
            }),
        ),
        tool(
            "list_proposals",
            "List curation proposals, optionally filtered by status",
            json!({
                "type": "object",
                "properties": {
                    "status": {"type": "string", "enum": ["pending", "approved", "rejected"]}
                }
            }),
        ),
        tool(
            "review_proposal",
            "Approve or reject a pending proposal; approval executes the proposed \
             mutation exactly once",
            json!({
                "type": "object",
                "properties": {
                    "proposal_id": {"type": "integer", "minimum": 1},
                    "decision": {"type": "string", "enum": ["approved", "rejected"]},
                    "review_notes": {"type": "string"}
                },
                "required": ["proposal_id", "decision"]
            }),
        ),
        tool(
            "graph_add_node",
            "Upsert a graph node under the current project",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "label": {"type": "string"},
                    "properties": {"type": "object"},
                    "insight_id": {"type": "integer", "minimum": 1}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "graph_add_edge",
            "Upsert a typed edge; the memory sector is classified from the relation \
             unless pinned",
            json!({
                "type": "object",
                "properties": {
                    "source_name": {"type": "string"},
                    "target_name": {"type": "string"},
                    "relation": {"type": "string"},
                    "memory_sector": {
                        "type": "string",
                        "enum": ["semantic", "episodic", "procedural", "emotional"]
                    },
                    "properties": {"type": "object"}
                },
                "required": ["source_name", "target_name", "relation"]
            }),
        ),
        tool(
            "expand_graph",
            "Walk edges outward from named nodes or insight ids, bounded depth, \
             optional sector filter",
            json!({
                "type": "object",
                "properties": {
                    "node_names": {"type": "array", "items": {"type": "string"}},
                    "insight_ids": {"type": "array", "items": {"type": "integer"}},
                    "depth": {"type": "integer", "minimum": 1, "maximum": 3},
                    "sector_filter": {
                        "type": "string",
                        "enum": ["semantic", "episodic", "procedural", "emotional"]
                    }
                }
            }),
        ),
        tool(
            "count_by_type",
            "Counts of all memory classes in one round-trip",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Dispatch one tool call. Unknown names are reported through the same
/// envelope as other handler failures.
pub async fn dispatch(name: &str, state: &ServerState, args: Value) -> Result<Value, ToolError> {
    match name {
        "set_project_context" => context::set_project_context(state, args).await,
        "store_insight" => insights::store_insight(state, args).await,
        "hybrid_search" => search::hybrid_search(state, args).await,
        "update_insight" => insights::update_insight(state, args).await,
        "delete_insight" => insights::delete_insight(state, args).await,
        "get_insight_history" => insights::get_insight_history(state, args).await,
        "submit_insight_feedback" => insights::submit_insight_feedback(state, args).await,
        "list_proposals" => proposals::list_proposals(state, args).await,
        "review_proposal" => proposals::review_proposal(state, args).await,
        "graph_add_node" => graph::add_node(state, args).await,
        "graph_add_edge" => graph::add_edge(state, args).await,
        "expand_graph" => graph::expand_graph(state, args).await,
        "count_by_type" => stats::count_by_type(state, args).await,
        other => Err(ToolError::validation(
            format!("Unknown tool: {}", other),
            "name",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_are_unique_and_schema_typed() {
        let defs = definitions();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len(), "tool names must be unique");

        for def in &defs {
            assert!(!def.description.is_empty());
            assert_eq!(def.input_schema["type"], "object");
        }
    }

    #[test]
    fn expected_surface_is_advertised() {
        let defs = definitions();
        for name in [
            "set_project_context",
            "store_insight",
            "hybrid_search",
            "update_insight",
            "delete_insight",
            "get_insight_history",
            "submit_insight_feedback",
            "list_proposals",
            "review_proposal",
            "graph_add_node",
            "graph_add_edge",
            "expand_graph",
            "count_by_type",
        ] {
            assert!(
                defs.iter().any(|d| d.name == name),
                "missing tool {}",
                name
            );
        }
    }
}

//! Memory-class counts.

use crate::state::{storage_error, ServerState};
use engram_protocol::ToolError;
use serde_json::{json, Value};

/// Parameterless; counts every memory class in one round-trip. Storage
/// failures map to the structured envelope without leaking connection
/// detail.
pub async fn count_by_type(state: &ServerState, _args: Value) -> Result<Value, ToolError> {
    let session = state.session().await?;
    let counts = session.count_by_type().await.map_err(storage_error)?;

    Ok(json!({
        "graph_nodes": counts.graph_nodes,
        "graph_edges": counts.graph_edges,
        "insights": counts.insights,
        "episodes": counts.episodes,
        "working_memory": counts.working_memory,
        "raw_dialogues": counts.raw_dialogues,
        "status": "success",
    }))
}

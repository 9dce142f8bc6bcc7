//! Graph tools: node/edge upserts and bounded neighbour expansion.

use crate::state::{storage_error, ServerState};
use crate::types::{from_args, AddEdgeRequest, AddNodeRequest, ExpandGraphRequest};
use engram_protocol::ToolError;
use serde_json::{json, Value};

pub async fn add_node(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: AddNodeRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    let node = session
        .add_node(
            &params.name,
            &params.label,
            params.properties,
            params.insight_id,
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "node_id": node.id,
        "name": node.name,
        "project_id": node.project_id,
    }))
}

pub async fn add_edge(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: AddEdgeRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    let edge = session
        .add_edge(
            &params.source_name,
            &params.target_name,
            &params.relation,
            params.memory_sector,
            params.properties,
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "edge_id": edge.id,
        "relation": edge.relation,
        "memory_sector": edge.memory_sector,
        "project_id": edge.project_id,
    }))
}

pub async fn expand_graph(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: ExpandGraphRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    let edges = session
        .expand_neighbors(&params.seeds, params.depth, params.sector)
        .await
        .map_err(storage_error)?;

    let count = edges.len();
    Ok(json!({
        "edges": edges,
        "count": count,
        "depth": params.depth,
    }))
}

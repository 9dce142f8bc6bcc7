//! Hybrid search tool.

use crate::state::ServerState;
use crate::types::{from_args, HybridSearchRequest};
use engram_protocol::ToolError;
use serde_json::{json, Value};

pub async fn hybrid_search(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: HybridSearchRequest = from_args(args)?;
    let search_request = request.validate()?;
    let session = state.session().await?;

    let response = state.search.run(&session, &search_request).await?;

    Ok(json!({
        "results": response.results,
        "variants_fused": response.variants_fused,
        "total_candidates": response.total_candidates,
        "status": "success",
    }))
}

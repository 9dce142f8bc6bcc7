//! Session project context.

use crate::state::{storage_error, ServerState};
use crate::types::{from_args, SetProjectContextRequest};
use engram_protocol::ToolError;
use serde_json::{json, Value};
use tracing::info;

/// Establish the session's current project. Only registered projects are
/// accepted; everything downstream scopes by this value.
pub async fn set_project_context(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: SetProjectContextRequest = from_args(args)?;
    let project_id = request.validate()?;

    let project = state
        .db
        .get_project(&project_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| {
            ToolError::not_found(format!("Project {} is not registered", project_id))
        })?;

    state.set_current_project(project_id.clone()).await;
    info!(%project_id, "session project context set");

    let phase = state
        .db
        .get_rollout_status(&project_id)
        .await
        .map_err(storage_error)?
        .map(|row| row.phase().as_str().to_string());

    Ok(json!({
        "project_id": project.project_id,
        "access_level": project.access_level,
        "phase": phase,
        "status": "ok",
    }))
}

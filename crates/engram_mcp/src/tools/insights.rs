//! Insight ingestion, curation, and feedback tools.
//!
//! Curation routes by actor: the privileged actor mutates immediately,
//! the non-privileged actor records a pending proposal and mutates
//! nothing until a privileged review approves it.

use crate::state::{storage_error, ServerState};
use crate::types::{
    from_args, DeleteInsightRequest, InsightHistoryRequest, StoreInsightRequest,
    SubmitFeedbackRequest, UpdateInsightRequest,
};
use engram_protocol::{ProposedAction, ToolError};
use serde_json::{json, Value};

pub async fn store_insight(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: StoreInsightRequest = from_args(args)?;
    let params = request.validate()?;

    // Embed before taking any connection.
    let embedding = state.search.gateway().embed(&params.content).await;

    let session = state.session().await?;
    let row = session
        .store_insight(
            &params.content,
            embedding,
            &params.source_ids,
            params.metadata,
            &params.tags,
            params.memory_strength,
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "insight_id": row.id,
        "project_id": row.project_id,
        "memory_strength": row.memory_strength,
    }))
}

pub async fn update_insight(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: UpdateInsightRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    if !params.actor.is_privileged() {
        // Consent path: snapshot the target, record the proposal, change
        // nothing else.
        let original = session
            .get_insight(params.insight_id)
            .await
            .map_err(storage_error)?;
        let action = ProposedAction::UpdateInsight {
            insight_id: params.insight_id,
            new_content: params.new_content.clone(),
            new_memory_strength: params.new_memory_strength,
            reason: params.reason.clone(),
        };
        let proposal = session
            .create_proposal(&action, &original)
            .await
            .map_err(storage_error)?;
        return Ok(json!({
            "success": true,
            "proposal_id": proposal.id,
            "status": proposal.status,
            "note": "update requires bilateral consent; awaiting review",
        }));
    }

    let outcome = session
        .update_insight(
            params.insight_id,
            params.new_content.as_deref(),
            params.new_memory_strength,
            params.actor,
            &params.reason,
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "insight_id": outcome.insight.id,
        "changed": outcome.changed,
        "memory_strength": outcome.insight.memory_strength,
    }))
}

pub async fn delete_insight(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: DeleteInsightRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    if !params.actor.is_privileged() {
        let original = session
            .get_insight(params.insight_id)
            .await
            .map_err(storage_error)?;
        let action = ProposedAction::DeleteInsight {
            insight_id: params.insight_id,
            reason: params.reason.clone(),
        };
        let proposal = session
            .create_proposal(&action, &original)
            .await
            .map_err(storage_error)?;
        return Ok(json!({
            "success": true,
            "proposal_id": proposal.id,
            "status": proposal.status,
            "note": "deletion requires bilateral consent; awaiting review",
        }));
    }

    let deleted = session
        .soft_delete_insight(params.insight_id, params.actor, &params.reason)
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "insight_id": deleted.id,
        "deleted_at": deleted.deleted_at,
        "deleted_by": deleted.deleted_by,
    }))
}

pub async fn get_insight_history(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: InsightHistoryRequest = from_args(args)?;
    let insight_id = request.validate()?;
    let session = state.session().await?;

    let revisions = session
        .get_insight_history(insight_id)
        .await
        .map_err(storage_error)?;

    let count = revisions.len();
    Ok(json!({
        "insight_id": insight_id,
        "revisions": revisions,
        "count": count,
    }))
}

pub async fn submit_insight_feedback(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: SubmitFeedbackRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    // Lazy evaluation: store only, never recompute here.
    let feedback_id = session
        .submit_feedback(
            params.insight_id,
            params.feedback_type,
            params.context.as_deref(),
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "feedback_id": feedback_id,
        "note": "scores will adjust on the next query",
    }))
}

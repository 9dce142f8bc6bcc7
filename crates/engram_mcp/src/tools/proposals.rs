//! Proposal listing and review.

use crate::state::{storage_error, ServerState};
use crate::types::{from_args, ListProposalsRequest, ReviewProposalRequest};
use engram_protocol::{Actor, ToolError};
use serde_json::{json, Value};

pub async fn list_proposals(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: ListProposalsRequest = from_args(args)?;
    let status = request.validate()?;
    let session = state.session().await?;

    let proposals = session
        .list_proposals(status)
        .await
        .map_err(storage_error)?;

    let count = proposals.len();
    Ok(json!({
        "proposals": proposals,
        "count": count,
    }))
}

/// Review a pending proposal. The reviewer is the privileged actor by
/// definition; approval executes the proposed mutation in the same
/// transaction as the status change, at most once.
pub async fn review_proposal(state: &ServerState, args: Value) -> Result<Value, ToolError> {
    let request: ReviewProposalRequest = from_args(args)?;
    let params = request.validate()?;
    let session = state.session().await?;

    let outcome = session
        .review_proposal(
            params.proposal_id,
            params.decision,
            Actor::Io,
            params.review_notes.as_deref(),
        )
        .await
        .map_err(storage_error)?;

    Ok(json!({
        "success": true,
        "proposal_id": outcome.proposal.id,
        "status": outcome.proposal.status,
        "executed": outcome.executed,
    }))
}

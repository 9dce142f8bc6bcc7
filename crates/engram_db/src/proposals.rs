//! Bilateral-consent proposals for mutations initiated by the
//! non-privileged actor.
//!
//! A pending proposal snapshots the target's original state and the
//! proposed action. Approval executes the underlying mutation in the same
//! transaction as the status change, so the mutation runs at most once no
//! matter how often the review is retried.

use crate::error::{DbError, Result};
use crate::insights::{delete_in_tx, update_in_tx};
use crate::rows::{InsightRow, ProposalRow};
use crate::session::Session;
use engram_protocol::{Actor, ProposalStatus, ProposedAction};
use tracing::info;

const PROPOSAL_COLUMNS: &str = "id, proposed_action, status, original_state, reviewer, \
     review_notes, created_at, reviewed_at";

/// Result of reviewing a proposal.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub proposal: ProposalRow,
    /// True when this call executed the underlying mutation (false on an
    /// idempotent retry or a rejection).
    pub executed: bool,
}

impl Session {
    /// Record a pending proposal with a snapshot of the target's state.
    pub async fn create_proposal(
        &self,
        action: &ProposedAction,
        original: &InsightRow,
    ) -> Result<ProposalRow> {
        // Proposals live in the project of the row they touch.
        self.policy().current()?;

        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, ProposalRow>(&format!(
            "INSERT INTO curation_proposals (proposed_action, original_state, status) \
             VALUES ($1, $2, 'pending') \
             RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(serde_json::to_value(action)?)
        .bind(serde_json::to_value(original)?)
        .fetch_one(&mut *conn)
        .await?;

        info!(
            proposal_id = row.id,
            action = action.kind(),
            insight_id = action.insight_id().as_i64(),
            "recorded pending proposal"
        );
        Ok(row)
    }

    pub async fn get_proposal(&self, proposal_id: i64) -> Result<ProposalRow> {
        let mut conn = self.acquire().await?;
        sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM curation_proposals WHERE id = $1"
        ))
        .bind(proposal_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found(format!("Proposal {} not found", proposal_id)))
    }

    pub async fn list_proposals(&self, status: Option<ProposalStatus>) -> Result<Vec<ProposalRow>> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM curation_proposals \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Review a pending proposal.
    ///
    /// `pending → approved` executes the proposed mutation in this
    /// transaction; `pending → rejected` leaves the target intact. A
    /// retried review of a terminal proposal with the same decision is an
    /// idempotent no-op; a different decision conflicts.
    pub async fn review_proposal(
        &self,
        proposal_id: i64,
        decision: ProposalStatus,
        reviewer: Actor,
        review_notes: Option<&str>,
    ) -> Result<ReviewOutcome> {
        if decision == ProposalStatus::Pending {
            return Err(DbError::precondition(
                "Review decision must be approved or rejected",
            ));
        }
        let project = self.policy().current()?.to_string();
        let mut tx = self.begin().await?;

        let proposal = sqlx::query_as::<_, ProposalRow>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM curation_proposals WHERE id = $1 FOR UPDATE"
        ))
        .bind(proposal_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found(format!("Proposal {} not found", proposal_id)))?;

        match proposal.status() {
            Some(ProposalStatus::Pending) => {}
            Some(terminal) if terminal == decision => {
                // Retried review: the mutation already ran (or was skipped).
                tx.rollback().await?;
                return Ok(ReviewOutcome {
                    proposal,
                    executed: false,
                });
            }
            _ => {
                return Err(DbError::conflict(format!(
                    "Proposal {} is already {}",
                    proposal_id, proposal.status
                )));
            }
        }

        let action = proposal.action().map_err(DbError::Serialization)?;

        let executed = if decision == ProposalStatus::Approved {
            // The mutation is attributed to the proposing actor; consent is
            // recorded on the proposal row itself.
            match &action {
                ProposedAction::DeleteInsight { insight_id, reason } => {
                    delete_in_tx(&mut tx, *insight_id, &project, Actor::Ethr, reason).await?;
                }
                ProposedAction::UpdateInsight {
                    insight_id,
                    new_content,
                    new_memory_strength,
                    reason,
                } => {
                    update_in_tx(
                        &mut tx,
                        *insight_id,
                        &project,
                        new_content.as_deref(),
                        *new_memory_strength,
                        Actor::Ethr,
                        reason,
                    )
                    .await?;
                }
            }
            true
        } else {
            false
        };

        let reviewed = sqlx::query_as::<_, ProposalRow>(&format!(
            "UPDATE curation_proposals \
             SET status = $2, reviewer = $3, review_notes = $4, reviewed_at = NOW() \
             WHERE id = $1 \
             RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(proposal_id)
        .bind(decision.as_str())
        .bind(reviewer.as_str())
        .bind(review_notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            proposal_id,
            decision = decision.as_str(),
            executed,
            "reviewed proposal"
        );
        Ok(ReviewOutcome {
            proposal: reviewed,
            executed,
        })
    }
}

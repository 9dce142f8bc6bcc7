//! Append-only insight feedback.
//!
//! Submissions are stored and never trigger recomputation; the re-scorer
//! reads the tallies at query time.

use crate::error::{DbError, Result};
use crate::rows::FeedbackTally;
use crate::session::Session;
use engram_protocol::{FeedbackType, InsightId};
use tracing::info;

impl Session {
    /// Store one feedback event for a live insight.
    pub async fn submit_feedback(
        &self,
        insight_id: InsightId,
        feedback_type: FeedbackType,
        context: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.acquire().await?;

        let live: Option<(bool,)> = sqlx::query_as(
            "SELECT is_deleted FROM insights \
             WHERE id = $1 AND ($2::text[] IS NULL OR project_id = ANY($2))",
        )
        .bind(insight_id.as_i64())
        .bind(self.policy().read_set())
        .fetch_optional(&mut *conn)
        .await?;
        match live {
            None | Some((true,)) => {
                return Err(DbError::not_found(format!(
                    "Insight {} not found",
                    insight_id
                )))
            }
            Some((false,)) => {}
        }

        let feedback_id: i64 = sqlx::query_scalar(
            "INSERT INTO insight_feedback (insight_id, feedback_type, context) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(insight_id.as_i64())
        .bind(feedback_type.as_str())
        .bind(context)
        .fetch_one(&mut *conn)
        .await?;

        info!(
            feedback_id,
            insight_id = insight_id.as_i64(),
            feedback_type = feedback_type.as_str(),
            has_context = context.is_some(),
            "stored feedback"
        );
        Ok(feedback_id)
    }

    /// Positive/negative event counts per insight, one round-trip.
    /// `not_now` events are stored but never tallied.
    pub async fn feedback_tallies(&self, insight_ids: &[i64]) -> Result<Vec<FeedbackTally>> {
        if insight_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.acquire().await?;
        let rows = sqlx::query_as::<_, FeedbackTally>(
            "SELECT insight_id, \
                    COUNT(*) FILTER (WHERE feedback_type = 'helpful') AS helpful, \
                    COUNT(*) FILTER (WHERE feedback_type = 'not_relevant') AS not_relevant \
             FROM insight_feedback \
             WHERE insight_id = ANY($1) \
             GROUP BY insight_id",
        )
        .bind(insight_ids)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

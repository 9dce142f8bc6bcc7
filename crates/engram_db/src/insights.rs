//! Insight storage and curation: create, update, soft delete, history.
//!
//! Every mutation appends its revision row inside the same transaction;
//! concurrent mutations of one insight serialise on a row lock taken
//! before the revision is written, so `version_id` sequences have no gaps
//! and no duplicates. The in-transaction helpers are shared with the
//! proposal machine, which executes an approved mutation in the same
//! transaction as the proposal's status change.

use crate::error::{DbError, Result};
use crate::rows::{InsightRow, RevisionRow};
use crate::session::Session;
use engram_protocol::{Actor, InsightId, RevisionAction};
use pgvector::Vector;
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use tracing::info;

const INSIGHT_COLUMNS: &str = "id, content, source_ids, metadata, tags, memory_strength, \
     is_deleted, deleted_at, deleted_by, deleted_reason, project_id, created_at, updated_at";

/// Outcome of an update that may have been a no-op.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub insight: InsightRow,
    /// False when the requested state matched the stored state and no
    /// revision was written.
    pub changed: bool,
}

impl Session {
    /// Insert a new insight under the current project.
    pub async fn store_insight(
        &self,
        content: &str,
        embedding: Vector,
        source_ids: &[i64],
        metadata: Value,
        tags: &[String],
        memory_strength: f64,
    ) -> Result<InsightRow> {
        let project = self.policy().current()?.to_string();
        let strength = memory_strength.clamp(0.0, 1.0);

        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, InsightRow>(&format!(
            "INSERT INTO insights \
                 (content, embedding, source_ids, metadata, tags, memory_strength, project_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {INSIGHT_COLUMNS}"
        ))
        .bind(content)
        .bind(embedding)
        .bind(source_ids)
        .bind(metadata)
        .bind(tags)
        .bind(strength)
        .bind(&project)
        .fetch_one(&mut *conn)
        .await?;

        info!(insight_id = row.id, %project, "stored insight");
        Ok(row)
    }

    /// Fetch a live insight visible to this session.
    ///
    /// Missing, soft-deleted, and (in enforcing phase) out-of-scope rows
    /// all surface as not-found.
    pub async fn get_insight(&self, id: InsightId) -> Result<InsightRow> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, InsightRow>(&format!(
            "SELECT {INSIGHT_COLUMNS} FROM insights \
             WHERE id = $1 AND is_deleted = FALSE \
               AND ($2::text[] IS NULL OR project_id = ANY($2))"
        ))
        .bind(id.as_i64())
        .bind(self.policy().read_set())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found(format!("Insight {} not found", id)))?;

        self.note_shadow_rows("insights", [row.project_id.as_str()])
            .await;
        Ok(row)
    }

    /// Update an insight's content and/or memory strength, recording the
    /// revision in the same transaction.
    ///
    /// Returns a no-op outcome (no revision) when the requested values
    /// match the stored row.
    pub async fn update_insight(
        &self,
        id: InsightId,
        new_content: Option<&str>,
        new_memory_strength: Option<f64>,
        actor: Actor,
        reason: &str,
    ) -> Result<UpdateOutcome> {
        let project = self.policy().current()?.to_string();
        let mut tx = self.begin().await?;
        let outcome = update_in_tx(
            &mut tx,
            id,
            &project,
            new_content,
            new_memory_strength,
            actor,
            reason,
        )
        .await?;

        if outcome.changed {
            tx.commit().await?;
            info!(insight_id = id.as_i64(), actor = actor.as_str(), "updated insight");
        } else {
            tx.rollback().await?;
        }
        Ok(outcome)
    }

    /// Soft-delete an insight, recording the revision in the same
    /// transaction. Double deletes conflict; missing rows are not found.
    pub async fn soft_delete_insight(
        &self,
        id: InsightId,
        actor: Actor,
        reason: &str,
    ) -> Result<InsightRow> {
        let project = self.policy().current()?.to_string();
        let mut tx = self.begin().await?;
        let deleted = delete_in_tx(&mut tx, id, &project, actor, reason).await?;
        tx.commit().await?;

        info!(insight_id = id.as_i64(), actor = actor.as_str(), reason, "soft-deleted insight");
        Ok(deleted)
    }

    /// Revision history for an insight, ascending by version.
    ///
    /// Soft-deleted insights keep their history readable; the parent row
    /// must merely exist within the session's read scope.
    pub async fn get_insight_history(&self, id: InsightId) -> Result<Vec<RevisionRow>> {
        let mut conn = self.acquire().await?;

        let parent: Option<(String,)> = sqlx::query_as(
            "SELECT project_id FROM insights \
             WHERE id = $1 AND ($2::text[] IS NULL OR project_id = ANY($2))",
        )
        .bind(id.as_i64())
        .bind(self.policy().read_set())
        .fetch_optional(&mut *conn)
        .await?;
        let Some((project,)) = parent else {
            return Err(DbError::not_found(format!("Insight {} not found", id)));
        };
        self.note_shadow_rows("insights", [project.as_str()]).await;

        let rows = sqlx::query_as::<_, RevisionRow>(
            "SELECT insight_id, version_id, action, actor, old_content, new_content, \
                    old_memory_strength, new_memory_strength, reason, created_at \
             FROM insight_revisions WHERE insight_id = $1 \
             ORDER BY version_id ASC",
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

/// Update body shared by the direct path and proposal approval. Locks the
/// row, writes the revision, applies the new values.
pub(crate) async fn update_in_tx(
    tx: &mut Transaction<'static, Postgres>,
    id: InsightId,
    project: &str,
    new_content: Option<&str>,
    new_memory_strength: Option<f64>,
    actor: Actor,
    reason: &str,
) -> Result<UpdateOutcome> {
    let current = lock_live_insight(tx, id, project).await?;

    let content = new_content.unwrap_or(&current.content).to_string();
    let strength = new_memory_strength
        .unwrap_or(current.memory_strength)
        .clamp(0.0, 1.0);

    if content == current.content && (strength - current.memory_strength).abs() < f64::EPSILON {
        return Ok(UpdateOutcome {
            insight: current,
            changed: false,
        });
    }

    append_revision(
        tx,
        id,
        RevisionAction::Update,
        actor,
        Some(&current.content),
        Some(&content),
        Some(current.memory_strength),
        Some(strength),
        reason,
    )
    .await?;

    let updated = sqlx::query_as::<_, InsightRow>(&format!(
        "UPDATE insights \
         SET content = $2, memory_strength = $3, updated_at = NOW() \
         WHERE id = $1 AND project_id = $4 \
         RETURNING {INSIGHT_COLUMNS}"
    ))
    .bind(id.as_i64())
    .bind(&content)
    .bind(strength)
    .bind(project)
    .fetch_one(&mut **tx)
    .await?;

    Ok(UpdateOutcome {
        insight: updated,
        changed: true,
    })
}

/// Soft-delete body shared by the direct path and proposal approval.
pub(crate) async fn delete_in_tx(
    tx: &mut Transaction<'static, Postgres>,
    id: InsightId,
    project: &str,
    actor: Actor,
    reason: &str,
) -> Result<InsightRow> {
    let current = sqlx::query_as::<_, InsightRow>(&format!(
        "SELECT {INSIGHT_COLUMNS} FROM insights \
         WHERE id = $1 AND project_id = $2 FOR UPDATE"
    ))
    .bind(id.as_i64())
    .bind(project)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| DbError::not_found(format!("Insight {} not found", id)))?;

    if current.is_deleted {
        return Err(DbError::conflict(format!(
            "Insight {} is already deleted",
            id
        )));
    }

    append_revision(
        tx,
        id,
        RevisionAction::Delete,
        actor,
        Some(&current.content),
        None,
        Some(current.memory_strength),
        None,
        reason,
    )
    .await?;

    let deleted = sqlx::query_as::<_, InsightRow>(&format!(
        "UPDATE insights \
         SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $3, \
             deleted_reason = $4, updated_at = NOW() \
         WHERE id = $1 AND project_id = $2 \
         RETURNING {INSIGHT_COLUMNS}"
    ))
    .bind(id.as_i64())
    .bind(project)
    .bind(actor.as_str())
    .bind(reason)
    .fetch_one(&mut **tx)
    .await?;

    Ok(deleted)
}

/// Lock a live insight row in the given project for mutation.
async fn lock_live_insight(
    tx: &mut Transaction<'static, Postgres>,
    id: InsightId,
    project: &str,
) -> Result<InsightRow> {
    let row = sqlx::query_as::<_, InsightRow>(&format!(
        "SELECT {INSIGHT_COLUMNS} FROM insights \
         WHERE id = $1 AND project_id = $2 FOR UPDATE"
    ))
    .bind(id.as_i64())
    .bind(project)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| DbError::not_found(format!("Insight {} not found", id)))?;

    if row.is_deleted {
        return Err(DbError::not_found(format!("Insight {} not found", id)));
    }
    Ok(row)
}

/// Append one revision row. The insert relies on the version trigger to
/// assign the next `version_id` under the caller's row lock.
#[allow(clippy::too_many_arguments)]
async fn append_revision(
    tx: &mut Transaction<'static, Postgres>,
    id: InsightId,
    action: RevisionAction,
    actor: Actor,
    old_content: Option<&str>,
    new_content: Option<&str>,
    old_strength: Option<f64>,
    new_strength: Option<f64>,
    reason: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO insight_revisions \
             (insight_id, action, actor, old_content, new_content, \
              old_memory_strength, new_memory_strength, reason) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id.as_i64())
    .bind(action.as_str())
    .bind(actor.as_str())
    .bind(old_content)
    .bind(new_content)
    .bind(old_strength)
    .bind(new_strength)
    .bind(reason)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

//! Project registry, read grants, and rollout status.
//!
//! Registry mutations are administrative: they are not subject to the
//! per-row project predicates (the registry itself is what those
//! predicates are derived from).

use crate::error::{DbError, Result};
use crate::rows::{ProjectRow, RolloutStatusRow};
use crate::EngramDb;
use engram_protocol::{AccessLevel, RolloutPhase};
use tracing::info;

impl EngramDb {
    /// Register a project. Access level defaults to isolated.
    pub async fn register_project(
        &self,
        project_id: &str,
        name: &str,
        access_level: AccessLevel,
    ) -> Result<ProjectRow> {
        if project_id.is_empty() {
            return Err(DbError::precondition("project_id must not be empty"));
        }
        let row = sqlx::query_as::<_, ProjectRow>(
            "INSERT INTO project_registry (project_id, name, access_level) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (project_id) DO UPDATE SET name = EXCLUDED.name \
             RETURNING project_id, name, access_level, created_at, updated_at",
        )
        .bind(project_id)
        .bind(name)
        .bind(access_level.as_str())
        .fetch_one(self.pool())
        .await?;

        info!(project_id, level = access_level.as_str(), "registered project");
        Ok(row)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Option<ProjectRow>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT project_id, name, access_level, created_at, updated_at \
             FROM project_registry WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT project_id, name, access_level, created_at, updated_at \
             FROM project_registry ORDER BY project_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Grant `reader` read access to `target`'s rows.
    ///
    /// Grants are one-directional and self-grants are implicit, so a
    /// reflexive grant is rejected rather than stored.
    pub async fn grant_project_read(&self, reader: &str, target: &str) -> Result<()> {
        if reader == target {
            return Err(DbError::conflict(
                "Self-grants are implicit and never stored",
            ));
        }
        for project in [reader, target] {
            if self.get_project(project).await?.is_none() {
                return Err(DbError::not_found(format!(
                    "Project {} is not registered",
                    project
                )));
            }
        }
        sqlx::query(
            "INSERT INTO project_read_grants (reader, target) VALUES ($1, $2) \
             ON CONFLICT (reader, target) DO NOTHING",
        )
        .bind(reader)
        .bind(target)
        .execute(self.pool())
        .await?;

        info!(reader, target, "granted cross-project read");
        Ok(())
    }

    /// Set a project's rollout phase (and enable flag).
    pub async fn set_rollout_phase(
        &self,
        project_id: &str,
        phase: RolloutPhase,
        enabled: bool,
    ) -> Result<()> {
        if self.get_project(project_id).await?.is_none() {
            return Err(DbError::not_found(format!(
                "Project {} is not registered",
                project_id
            )));
        }
        sqlx::query(
            "INSERT INTO rls_migration_status (project_id, phase, enabled) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (project_id) DO UPDATE \
             SET phase = EXCLUDED.phase, enabled = EXCLUDED.enabled, updated_at = NOW()",
        )
        .bind(project_id)
        .bind(phase.as_str())
        .bind(enabled)
        .execute(self.pool())
        .await?;

        info!(project_id, phase = phase.as_str(), enabled, "set rollout phase");
        Ok(())
    }

    pub async fn get_rollout_status(&self, project_id: &str) -> Result<Option<RolloutStatusRow>> {
        let row = sqlx::query_as::<_, RolloutStatusRow>(
            "SELECT project_id, phase, enabled, updated_at \
             FROM rls_migration_status WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }
}

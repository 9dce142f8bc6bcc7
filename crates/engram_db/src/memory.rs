//! Episode, working, and raw memory classes.
//!
//! Working memory is bounded per project; inserting past the capacity
//! evicts the least-recently-accessed rows of that project only.

use crate::error::Result;
use crate::rows::{EpisodeRow, WorkingMemoryRow};
use crate::session::Session;
use pgvector::Vector;
use serde_json::Value;
use tracing::debug;

impl Session {
    /// Store an episode memory under the current project.
    pub async fn add_episode(
        &self,
        content: &str,
        embedding: Vector,
        metadata: Value,
    ) -> Result<EpisodeRow> {
        let project = self.policy().current()?.to_string();
        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, EpisodeRow>(
            "INSERT INTO episode_memory (content, embedding, metadata, project_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, content, metadata, project_id, created_at",
        )
        .bind(content)
        .bind(embedding)
        .bind(metadata)
        .bind(&project)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Store a raw dialogue row under the current project.
    pub async fn add_raw_dialogue(
        &self,
        content: &str,
        embedding: Vector,
        dialogue: Value,
    ) -> Result<i64> {
        let project = self.policy().current()?.to_string();
        let mut conn = self.acquire().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO l0_raw (content, embedding, dialogue, project_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(content)
        .bind(embedding)
        .bind(dialogue)
        .bind(&project)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Insert into working memory and evict past the per-project capacity.
    ///
    /// Eviction is LRU-by-access and runs in the same transaction as the
    /// insert; it only ever touches the current project's rows.
    pub async fn add_working_memory(&self, content: &str) -> Result<WorkingMemoryRow> {
        let project = self.policy().current()?.to_string();
        let capacity = self.config().working_memory_capacity;
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<_, WorkingMemoryRow>(
            "INSERT INTO working_memory (content, project_id) VALUES ($1, $2) \
             RETURNING id, content, project_id, last_accessed_at, created_at",
        )
        .bind(content)
        .bind(&project)
        .fetch_one(&mut *tx)
        .await?;

        let evicted = sqlx::query(
            "DELETE FROM working_memory \
             WHERE project_id = $1 AND id NOT IN ( \
                 SELECT id FROM working_memory WHERE project_id = $1 \
                 ORDER BY last_accessed_at DESC, id DESC LIMIT $2)",
        )
        .bind(&project)
        .bind(capacity)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        if evicted > 0 {
            debug!(%project, evicted, "evicted working-memory rows");
        }
        Ok(row)
    }

    /// Refresh a working-memory row's access time.
    pub async fn touch_working_memory(&self, id: i64) -> Result<()> {
        let project = self.policy().current()?.to_string();
        let mut conn = self.acquire().await?;
        sqlx::query(
            "UPDATE working_memory SET last_accessed_at = NOW() \
             WHERE id = $1 AND project_id = $2",
        )
        .bind(id)
        .bind(&project)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Working-memory rows for the current project, most recent first.
    pub async fn list_working_memory(&self) -> Result<Vec<WorkingMemoryRow>> {
        let project = self.policy().current()?.to_string();
        let mut conn = self.acquire().await?;
        let rows = sqlx::query_as::<_, WorkingMemoryRow>(
            "SELECT id, content, project_id, last_accessed_at, created_at \
             FROM working_memory WHERE project_id = $1 \
             ORDER BY last_accessed_at DESC, id DESC",
        )
        .bind(&project)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

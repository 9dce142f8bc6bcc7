//! Aggregate counts across memory classes.

use crate::error::Result;
use crate::rows::MemoryCounts;
use crate::session::Session;

impl Session {
    /// Counts of every memory class in one UNION ALL round-trip.
    ///
    /// Counts honour the session's read scope; soft-deleted insights are
    /// excluded.
    pub async fn count_by_type(&self) -> Result<MemoryCounts> {
        let mut conn = self.acquire().await?;
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT 'graph_nodes' AS kind, COUNT(*) FROM nodes \
                 WHERE ($1::text[] IS NULL OR project_id = ANY($1)) \
             UNION ALL \
             SELECT 'graph_edges', COUNT(*) FROM edges \
                 WHERE ($1::text[] IS NULL OR project_id = ANY($1)) \
             UNION ALL \
             SELECT 'insights', COUNT(*) FROM insights \
                 WHERE is_deleted = FALSE AND ($1::text[] IS NULL OR project_id = ANY($1)) \
             UNION ALL \
             SELECT 'episodes', COUNT(*) FROM episode_memory \
                 WHERE ($1::text[] IS NULL OR project_id = ANY($1)) \
             UNION ALL \
             SELECT 'working_memory', COUNT(*) FROM working_memory \
                 WHERE ($1::text[] IS NULL OR project_id = ANY($1)) \
             UNION ALL \
             SELECT 'raw_dialogues', COUNT(*) FROM l0_raw \
                 WHERE ($1::text[] IS NULL OR project_id = ANY($1))",
        )
        .bind(self.policy().read_set())
        .fetch_all(&mut *conn)
        .await?;

        let mut counts = MemoryCounts::default();
        for (kind, count) in rows {
            match kind.as_str() {
                "graph_nodes" => counts.graph_nodes = count,
                "graph_edges" => counts.graph_edges = count,
                "insights" => counts.insights = count,
                "episodes" => counts.episodes = count,
                "working_memory" => counts.working_memory = count,
                "raw_dialogues" => counts.raw_dialogues = count,
                _ => {}
            }
        }
        Ok(counts)
    }
}

//! Typed knowledge graph: nodes, edges, bounded neighbour expansion.
//!
//! The graph is relational; traversal is an explicit per-depth loop, never
//! recursion over in-memory references.

use crate::error::{DbError, Result};
use crate::rows::{EdgeRow, NodeRow};
use crate::session::Session;
use engram_protocol::{InsightId, MemorySector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;

/// Maximum expansion depth accepted from callers.
pub const MAX_EXPANSION_DEPTH: u32 = 3;

const NODE_COLUMNS: &str = "id, name, label, properties, insight_id, project_id, created_at";
const EDGE_COLUMNS: &str =
    "id, source_name, target_name, relation, memory_sector, properties, project_id, created_at";

/// Where a neighbour expansion starts.
#[derive(Debug, Clone)]
pub enum ExpansionSeeds {
    /// Explicit node names.
    Nodes(Vec<String>),
    /// Nodes derived from these insights.
    Insights(Vec<InsightId>),
}

impl Session {
    /// Upsert a node under the current project, keyed by `(project, name)`.
    pub async fn add_node(
        &self,
        name: &str,
        label: &str,
        properties: Value,
        insight_id: Option<InsightId>,
    ) -> Result<NodeRow> {
        let project = self.policy().current()?.to_string();
        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            "INSERT INTO nodes (name, label, properties, insight_id, project_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (project_id, name) DO UPDATE \
             SET label = EXCLUDED.label, properties = EXCLUDED.properties \
             RETURNING {NODE_COLUMNS}"
        ))
        .bind(name)
        .bind(label)
        .bind(properties)
        .bind(insight_id.map(|id| id.as_i64()))
        .bind(&project)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Upsert an edge under the current project.
    ///
    /// The memory sector is classified from the relation unless the caller
    /// pins one explicitly. `(source, target, relation)` is the logical
    /// unique key.
    pub async fn add_edge(
        &self,
        source_name: &str,
        target_name: &str,
        relation: &str,
        sector: Option<MemorySector>,
        properties: Value,
    ) -> Result<EdgeRow> {
        let project = self.policy().current()?.to_string();
        let sector = sector.unwrap_or_else(|| MemorySector::classify_relation(relation));

        let mut conn = self.acquire().await?;
        let row = sqlx::query_as::<_, EdgeRow>(&format!(
            "INSERT INTO edges \
                 (source_name, target_name, relation, memory_sector, properties, project_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (project_id, source_name, target_name, relation) DO UPDATE \
             SET memory_sector = EXCLUDED.memory_sector, properties = EXCLUDED.properties \
             RETURNING {EDGE_COLUMNS}"
        ))
        .bind(source_name)
        .bind(target_name)
        .bind(relation)
        .bind(sector.as_str())
        .bind(properties)
        .bind(&project)
        .fetch_one(&mut *conn)
        .await?;

        info!(
            source = source_name,
            target = target_name,
            relation,
            sector = sector.as_str(),
            "added edge"
        );
        Ok(row)
    }

    /// Walk edges outward from the seeds up to `depth` hops.
    ///
    /// Returns each reached edge (with its memory sector) exactly once.
    /// The walk honours the read scope and the optional sector filter.
    pub async fn expand_neighbors(
        &self,
        seeds: &ExpansionSeeds,
        depth: u32,
        sector: Option<MemorySector>,
    ) -> Result<Vec<EdgeRow>> {
        let depth = depth.min(MAX_EXPANSION_DEPTH);
        let mut conn = self.acquire().await?;

        let mut frontier: Vec<String> = match seeds {
            ExpansionSeeds::Nodes(names) => names.clone(),
            ExpansionSeeds::Insights(ids) => {
                let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
                if ids.is_empty() {
                    return Err(DbError::precondition("Expansion requires at least one seed"));
                }
                sqlx::query_scalar(
                    "SELECT name FROM nodes \
                     WHERE insight_id = ANY($1) \
                       AND ($2::text[] IS NULL OR project_id = ANY($2))",
                )
                .bind(&ids)
                .bind(self.policy().read_set())
                .fetch_all(&mut *conn)
                .await?
            }
        };
        if frontier.is_empty() {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<String> = frontier.iter().cloned().collect();
        let mut seen_edges: HashSet<i64> = HashSet::new();
        let mut edges: Vec<EdgeRow> = Vec::new();

        for _ in 0..depth {
            let batch = sqlx::query_as::<_, EdgeRow>(&format!(
                "SELECT {EDGE_COLUMNS} FROM edges \
                 WHERE (source_name = ANY($1) OR target_name = ANY($1)) \
                   AND ($2::text[] IS NULL OR project_id = ANY($2)) \
                   AND ($3::text IS NULL OR memory_sector = $3) \
                 ORDER BY id"
            ))
            .bind(&frontier)
            .bind(self.policy().read_set())
            .bind(sector.map(|s| s.as_str()))
            .fetch_all(&mut *conn)
            .await?;

            let mut next: Vec<String> = Vec::new();
            for edge in batch {
                if !seen_edges.insert(edge.id) {
                    continue;
                }
                for name in [&edge.source_name, &edge.target_name] {
                    if visited.insert(name.clone()) {
                        next.push(name.clone());
                    }
                }
                edges.push(edge);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        self.note_shadow_rows("edges", edges.iter().map(|e| e.project_id.as_str()))
            .await;
        Ok(edges)
    }
}

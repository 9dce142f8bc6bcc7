//! Per-source candidate generation for hybrid search.
//!
//! Each generator returns a ranked list of `{id, score, source_type,
//! payload}` rows drawn from the filtered candidate set under the
//! session's read scope. Tie-breaks within a source: higher memory
//! strength, then newer creation time, then smaller id.

use crate::error::Result;
use crate::session::Session;
use chrono::{DateTime, Utc};
use engram_protocol::{FilterSpec, SearchCandidate, SourceType};
use pgvector::Vector;
use serde_json::json;
use sqlx::{FromRow, Postgres, QueryBuilder};

#[derive(Debug, FromRow)]
struct InsightHit {
    id: i64,
    content: String,
    tags: Vec<String>,
    memory_strength: f64,
    project_id: String,
    created_at: DateTime<Utc>,
    score: f64,
}

#[derive(Debug, FromRow)]
struct EpisodeHit {
    id: i64,
    content: String,
    project_id: String,
    created_at: DateTime<Utc>,
    score: f64,
}

impl Session {
    /// Cosine-similarity search over live insights.
    pub async fn insight_vector_candidates(
        &self,
        embedding: &Vector,
        spec: &FilterSpec,
        limit: i64,
    ) -> Result<Vec<SearchCandidate>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, content, tags, memory_strength, project_id, created_at, \
                    1 - (embedding <=> ",
        );
        qb.push_bind(embedding.clone());
        qb.push(") AS score FROM insights WHERE is_deleted = FALSE");
        self.push_common_filters(&mut qb, spec);
        qb.push(" ORDER BY embedding <=> ");
        qb.push_bind(embedding.clone());
        qb.push(" ASC, memory_strength DESC, created_at DESC, id ASC LIMIT ");
        qb.push_bind(limit);

        let mut conn = self.acquire().await?;
        let hits: Vec<InsightHit> = qb.build_query_as().fetch_all(&mut *conn).await?;
        self.note_shadow_rows("insights", hits.iter().map(|h| h.project_id.as_str()))
            .await;
        Ok(hits.into_iter().map(insight_candidate).collect())
    }

    /// Full-text search over live insight content and metadata.
    pub async fn insight_lexical_candidates(
        &self,
        query: &str,
        spec: &FilterSpec,
        limit: i64,
    ) -> Result<Vec<SearchCandidate>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, content, tags, memory_strength, project_id, created_at, \
                    ts_rank(to_tsvector('english', content || ' ' || COALESCE(metadata::text, '')), \
                            plainto_tsquery('english', ",
        );
        qb.push_bind(query);
        qb.push("))::float8 AS score FROM insights WHERE is_deleted = FALSE");
        qb.push(
            " AND to_tsvector('english', content || ' ' || COALESCE(metadata::text, '')) \
               @@ plainto_tsquery('english', ",
        );
        qb.push_bind(query);
        qb.push(")");
        self.push_common_filters(&mut qb, spec);
        qb.push(" ORDER BY score DESC, memory_strength DESC, created_at DESC, id ASC LIMIT ");
        qb.push_bind(limit);

        let mut conn = self.acquire().await?;
        let hits: Vec<InsightHit> = qb.build_query_as().fetch_all(&mut *conn).await?;
        self.note_shadow_rows("insights", hits.iter().map(|h| h.project_id.as_str()))
            .await;
        Ok(hits.into_iter().map(insight_candidate).collect())
    }

    /// Cosine-similarity search over episode memories.
    pub async fn episode_vector_candidates(
        &self,
        embedding: &Vector,
        spec: &FilterSpec,
        limit: i64,
    ) -> Result<Vec<SearchCandidate>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, content, project_id, created_at, 1 - (embedding <=> ",
        );
        qb.push_bind(embedding.clone());
        qb.push(") AS score FROM episode_memory WHERE TRUE");
        self.push_scope_and_dates(&mut qb, spec);
        qb.push(" ORDER BY embedding <=> ");
        qb.push_bind(embedding.clone());
        qb.push(" ASC, created_at DESC, id ASC LIMIT ");
        qb.push_bind(limit);

        let mut conn = self.acquire().await?;
        let hits: Vec<EpisodeHit> = qb.build_query_as().fetch_all(&mut *conn).await?;
        self.note_shadow_rows("episode_memory", hits.iter().map(|h| h.project_id.as_str()))
            .await;
        Ok(hits
            .into_iter()
            .map(|h| {
                SearchCandidate::new(
                    SourceType::Episode,
                    h.id,
                    h.score,
                    json!({
                        "content": h.content,
                        "project_id": h.project_id,
                        "created_at": h.created_at,
                    }),
                )
            })
            .collect())
    }

    /// Cosine-similarity search over raw dialogue rows.
    ///
    /// Raw memory is its own retrieval surface; it does not participate in
    /// hybrid fusion (the fused source set is insight/episode/graph).
    pub async fn raw_vector_candidates(
        &self,
        embedding: &Vector,
        spec: &FilterSpec,
        limit: i64,
    ) -> Result<Vec<(i64, f64, String)>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, content, project_id, created_at, 1 - (embedding <=> ");
        qb.push_bind(embedding.clone());
        qb.push(") AS score FROM l0_raw WHERE TRUE");
        self.push_scope_and_dates(&mut qb, spec);
        qb.push(" ORDER BY embedding <=> ");
        qb.push_bind(embedding.clone());
        qb.push(" ASC, created_at DESC, id ASC LIMIT ");
        qb.push_bind(limit);

        let mut conn = self.acquire().await?;
        let hits: Vec<EpisodeHit> = qb.build_query_as().fetch_all(&mut *conn).await?;
        self.note_shadow_rows("l0_raw", hits.iter().map(|h| h.project_id.as_str()))
            .await;
        Ok(hits.into_iter().map(|h| (h.id, h.score, h.content)).collect())
    }

    /// Read scope, tag overlap, and date-range filters for insight queries.
    fn push_common_filters(&self, qb: &mut QueryBuilder<'_, Postgres>, spec: &FilterSpec) {
        if let Some(set) = self.policy().read_set() {
            qb.push(" AND project_id = ANY(");
            qb.push_bind(set.to_vec());
            qb.push(")");
        }
        if let Some(tags) = &spec.tags {
            qb.push(" AND tags && ");
            qb.push_bind(tags.clone());
        }
        self.push_dates(qb, spec);
    }

    /// Read scope and date-range filters for tag-less memory classes.
    fn push_scope_and_dates(&self, qb: &mut QueryBuilder<'_, Postgres>, spec: &FilterSpec) {
        if let Some(set) = self.policy().read_set() {
            qb.push(" AND project_id = ANY(");
            qb.push_bind(set.to_vec());
            qb.push(")");
        }
        self.push_dates(qb, spec);
    }

    fn push_dates(&self, qb: &mut QueryBuilder<'_, Postgres>, spec: &FilterSpec) {
        if let Some(from) = spec.date_from {
            qb.push(" AND created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = spec.date_to {
            qb.push(" AND created_at <= ");
            qb.push_bind(to);
        }
    }
}

fn insight_candidate(hit: InsightHit) -> SearchCandidate {
    SearchCandidate::new(
        SourceType::Insight,
        hit.id,
        hit.score,
        json!({
            "content": hit.content,
            "tags": hit.tags,
            "memory_strength": hit.memory_strength,
            "project_id": hit.project_id,
            "created_at": hit.created_at,
        }),
    )
}

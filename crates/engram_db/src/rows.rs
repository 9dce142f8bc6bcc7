//! Typed row records for all Engram tables.
//!
//! Rows are parsed into these records at the storage boundary. Enum-valued
//! columns are stored as text and surfaced through typed accessors so
//! business code never matches on raw strings.

use chrono::{DateTime, Utc};
use engram_protocol::{
    AccessLevel, Actor, InsightId, MemorySector, ProposalStatus, ProposedAction, RevisionAction,
    RolloutPhase,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// A registered project (logical tenant).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectRow {
    pub project_id: String,
    pub name: String,
    pub access_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn access_level(&self) -> AccessLevel {
        // Unknown values degrade to the most restrictive tier.
        AccessLevel::parse(&self.access_level).unwrap_or(AccessLevel::Isolated)
    }
}

/// Per-project access-control rollout state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RolloutStatusRow {
    pub project_id: String,
    pub phase: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl RolloutStatusRow {
    pub fn phase(&self) -> RolloutPhase {
        RolloutPhase::parse(&self.phase).unwrap_or(RolloutPhase::Enforcing)
    }
}

/// A derived insight. The embedding column is written on insert but not
/// read back into this record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InsightRow {
    pub id: i64,
    pub content: String,
    pub source_ids: Vec<i64>,
    pub metadata: Value,
    pub tags: Vec<String>,
    pub memory_strength: f64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub deleted_reason: Option<String>,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsightRow {
    pub fn insight_id(&self) -> InsightId {
        InsightId::new(self.id)
    }
}

/// One immutable history entry for an insight mutation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RevisionRow {
    pub insight_id: i64,
    pub version_id: i32,
    pub action: String,
    pub actor: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub old_memory_strength: Option<f64>,
    pub new_memory_strength: Option<f64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl RevisionRow {
    pub fn action(&self) -> Option<RevisionAction> {
        RevisionAction::parse(&self.action)
    }

    pub fn actor(&self) -> Option<Actor> {
        Actor::parse(&self.actor)
    }
}

/// A graph vertex. `insight_id` links nodes derived from an insight.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeRow {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub properties: Value,
    pub insight_id: Option<i64>,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

/// A typed graph edge carrying its memory-sector classification.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EdgeRow {
    pub id: i64,
    pub source_name: String,
    pub target_name: String,
    pub relation: String,
    pub memory_sector: String,
    pub properties: Value,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

impl EdgeRow {
    pub fn sector(&self) -> MemorySector {
        MemorySector::parse(&self.memory_sector).unwrap_or_default()
    }
}

/// An episode memory row (vector-searchable).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EpisodeRow {
    pub id: i64,
    pub content: String,
    pub metadata: Value,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

/// A working-memory row; evicted LRU-by-access per project.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkingMemoryRow {
    pub id: i64,
    pub content: String,
    pub project_id: String,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A curation proposal awaiting or past bilateral consent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProposalRow {
    pub id: i64,
    pub proposed_action: Value,
    pub status: String,
    pub original_state: Value,
    pub reviewer: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ProposalRow {
    pub fn status(&self) -> Option<ProposalStatus> {
        ProposalStatus::parse(&self.status)
    }

    pub fn action(&self) -> Result<ProposedAction, serde_json::Error> {
        serde_json::from_value(self.proposed_action.clone())
    }
}

/// Per-insight feedback aggregate used by the query-time re-scorer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeedbackTally {
    pub insight_id: i64,
    pub helpful: i64,
    pub not_relevant: i64,
}

/// Counts of every memory class, fetched in one round-trip.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryCounts {
    pub graph_nodes: i64,
    pub graph_edges: i64,
    pub insights: i64,
    pub episodes: i64,
    pub working_memory: i64,
    pub raw_dialogues: i64,
}

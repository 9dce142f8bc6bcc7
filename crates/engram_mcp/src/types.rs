//! Typed request structures for every tool handler.
//!
//! Arguments arrive as JSON maps. Each handler deserializes into a lenient
//! struct (every field optional), then runs a validation pass that
//! collects all issues before reporting one structured validation error.
//! Handlers never see unvalidated input.

use chrono::{DateTime, Utc};
use engram_protocol::{
    Actor, FeedbackType, FilterOptions, InsightId, MemorySector, ProposalStatus, ToolError,
};
use serde::Deserialize;
use serde_json::Value;

/// Deserialize tool arguments, mapping malformed shapes to a validation
/// error rather than a protocol failure.
pub fn from_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|err| ToolError::validation(format!("Invalid arguments: {}", err), ""))
}

fn require<'a, T>(value: &'a Option<T>, field: &str, issues: &mut Vec<String>) -> Option<&'a T> {
    if value.is_none() {
        issues.push(format!("{} is required", field));
    }
    value.as_ref()
}

fn finish<T>(value: T, issues: Vec<String>) -> Result<T, ToolError> {
    if issues.is_empty() {
        Ok(value)
    } else {
        Err(ToolError::validation_multi(&issues))
    }
}

fn parse_insight_id(raw: Option<i64>, issues: &mut Vec<String>) -> InsightId {
    match raw {
        None => {
            issues.push("insight_id is required".to_string());
            InsightId::new(0)
        }
        Some(value) => match InsightId::from_request(value) {
            Ok(id) => id,
            Err(err) => {
                issues.push(err.to_string());
                InsightId::new(0)
            }
        },
    }
}

fn parse_actor(raw: &Option<String>, issues: &mut Vec<String>) -> Actor {
    match raw.as_deref() {
        None => {
            issues.push("actor is required".to_string());
            Actor::Ethr
        }
        Some(s) => match Actor::parse(s) {
            Some(actor) => actor,
            None => {
                issues.push(format!("actor must be one of: I/O, ethr (got {:?})", s));
                Actor::Ethr
            }
        },
    }
}

fn parse_reason(raw: &Option<String>, issues: &mut Vec<String>) -> String {
    match raw.as_deref().map(str::trim) {
        None | Some("") => {
            issues.push("reason is required and must be non-empty".to_string());
            String::new()
        }
        Some(reason) => reason.to_string(),
    }
}

// ============================================================================
// Session context
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SetProjectContextRequest {
    pub project_id: Option<String>,
}

impl SetProjectContextRequest {
    pub fn validate(self) -> Result<String, ToolError> {
        let mut issues = Vec::new();
        let project = require(&self.project_id, "project_id", &mut issues)
            .map(|p| p.trim().to_string())
            .unwrap_or_default();
        if self.project_id.is_some() && project.is_empty() {
            issues.push("project_id must be non-empty".to_string());
        }
        finish(project, issues)
    }
}

// ============================================================================
// Ingestion
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StoreInsightRequest {
    pub content: Option<String>,
    pub source_ids: Option<Vec<i64>>,
    pub metadata: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub memory_strength: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StoreInsightParams {
    pub content: String,
    pub source_ids: Vec<i64>,
    pub metadata: Value,
    pub tags: Vec<String>,
    pub memory_strength: f64,
}

impl StoreInsightRequest {
    pub fn validate(self) -> Result<StoreInsightParams, ToolError> {
        let mut issues = Vec::new();
        let content = require(&self.content, "content", &mut issues)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if self.content.is_some() && content.is_empty() {
            issues.push("content must be non-empty".to_string());
        }
        let memory_strength = self.memory_strength.unwrap_or(0.5);
        if !(0.0..=1.0).contains(&memory_strength) {
            issues.push("memory_strength must be within [0, 1]".to_string());
        }
        finish(
            StoreInsightParams {
                content,
                source_ids: self.source_ids.unwrap_or_default(),
                metadata: self.metadata.unwrap_or_else(|| Value::Object(Default::default())),
                tags: self.tags.unwrap_or_default(),
                memory_strength,
            },
            issues,
        )
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchRequest {
    pub query: Option<String>,
    pub query_variants: Option<Vec<String>>,
    pub top_k: Option<usize>,
    pub tags_filter: Option<Vec<String>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub source_type_filter: Option<Vec<String>>,
    pub sector_filter: Option<String>,
    pub include_graph: Option<bool>,
}

impl HybridSearchRequest {
    /// Full request validation at the tool boundary, before any session is
    /// opened: a bad request must never surface as a storage failure.
    pub fn validate(self) -> Result<engram_search::SearchRequest, ToolError> {
        let mut issues = Vec::new();
        let query = require(&self.query, "query", &mut issues)
            .map(|q| q.trim().to_string())
            .unwrap_or_default();
        if self.query.is_some() && query.is_empty() {
            issues.push("query must not be empty".to_string());
        }
        let variants = self.query_variants.unwrap_or_default();
        if variants.len() > engram_search::MAX_QUERY_VARIANTS {
            issues.push(format!(
                "at most {} query_variants are accepted",
                engram_search::MAX_QUERY_VARIANTS
            ));
        }
        if let Some(top_k) = self.top_k {
            if top_k == 0 || top_k > engram_search::MAX_TOP_K {
                issues.push(format!(
                    "top_k must be between 1 and {}",
                    engram_search::MAX_TOP_K
                ));
            }
        }
        let sector = match self.sector_filter.as_deref() {
            None => None,
            Some(raw) => match MemorySector::parse(raw) {
                Some(sector) => Some(sector),
                None => {
                    issues.push(format!(
                        "sector_filter must be one of: semantic, episodic, procedural, emotional (got {:?})",
                        raw
                    ));
                    None
                }
            },
        };

        let filters = FilterOptions {
            tags_filter: self.tags_filter,
            date_from: self.date_from,
            date_to: self.date_to,
            source_type_filter: self.source_type_filter,
            sector_filter: sector,
        };
        if let Err(err) = engram_search::validate_filters(&filters) {
            issues.push(err.message);
        }

        finish(
            engram_search::SearchRequest {
                query,
                query_variants: variants,
                top_k: self.top_k,
                filters,
                include_graph: self.include_graph.unwrap_or(false),
            },
            issues,
        )
    }
}

// ============================================================================
// Curation
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInsightRequest {
    pub insight_id: Option<i64>,
    pub new_content: Option<String>,
    pub new_memory_strength: Option<f64>,
    pub actor: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateInsightParams {
    pub insight_id: InsightId,
    pub new_content: Option<String>,
    pub new_memory_strength: Option<f64>,
    pub actor: Actor,
    pub reason: String,
}

impl UpdateInsightRequest {
    pub fn validate(self) -> Result<UpdateInsightParams, ToolError> {
        let mut issues = Vec::new();
        let insight_id = parse_insight_id(self.insight_id, &mut issues);
        let actor = parse_actor(&self.actor, &mut issues);
        let reason = parse_reason(&self.reason, &mut issues);

        if self.new_content.is_none() && self.new_memory_strength.is_none() {
            issues.push(
                "at least one of new_content, new_memory_strength is required".to_string(),
            );
        }
        if let Some(content) = self.new_content.as_deref() {
            if content.trim().is_empty() {
                issues.push("new_content must be non-empty".to_string());
            }
        }
        if let Some(strength) = self.new_memory_strength {
            if !(0.0..=1.0).contains(&strength) {
                issues.push("new_memory_strength must be within [0, 1]".to_string());
            }
        }
        finish(
            UpdateInsightParams {
                insight_id,
                new_content: self.new_content,
                new_memory_strength: self.new_memory_strength,
                actor,
                reason,
            },
            issues,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteInsightRequest {
    pub insight_id: Option<i64>,
    pub actor: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteInsightParams {
    pub insight_id: InsightId,
    pub actor: Actor,
    pub reason: String,
}

impl DeleteInsightRequest {
    pub fn validate(self) -> Result<DeleteInsightParams, ToolError> {
        let mut issues = Vec::new();
        let insight_id = parse_insight_id(self.insight_id, &mut issues);
        let actor = parse_actor(&self.actor, &mut issues);
        let reason = parse_reason(&self.reason, &mut issues);
        finish(
            DeleteInsightParams {
                insight_id,
                actor,
                reason,
            },
            issues,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightHistoryRequest {
    pub insight_id: Option<i64>,
}

impl InsightHistoryRequest {
    pub fn validate(self) -> Result<InsightId, ToolError> {
        let mut issues = Vec::new();
        let id = parse_insight_id(self.insight_id, &mut issues);
        finish(id, issues)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub insight_id: Option<i64>,
    pub feedback_type: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmitFeedbackParams {
    pub insight_id: InsightId,
    pub feedback_type: FeedbackType,
    pub context: Option<String>,
}

impl SubmitFeedbackRequest {
    pub fn validate(self) -> Result<SubmitFeedbackParams, ToolError> {
        let mut issues = Vec::new();
        let insight_id = parse_insight_id(self.insight_id, &mut issues);
        let feedback_type = match self.feedback_type.as_deref() {
            None => {
                issues.push("feedback_type is required".to_string());
                FeedbackType::NotNow
            }
            Some(raw) => match FeedbackType::parse(raw) {
                Some(ft) => ft,
                None => {
                    issues.push(
                        "feedback_type must be one of: helpful, not_relevant, not_now".to_string(),
                    );
                    FeedbackType::NotNow
                }
            },
        };
        finish(
            SubmitFeedbackParams {
                insight_id,
                feedback_type,
                context: self.context,
            },
            issues,
        )
    }
}

// ============================================================================
// Proposals
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewProposalRequest {
    pub proposal_id: Option<i64>,
    pub decision: Option<String>,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewProposalParams {
    pub proposal_id: i64,
    pub decision: ProposalStatus,
    pub review_notes: Option<String>,
}

impl ReviewProposalRequest {
    pub fn validate(self) -> Result<ReviewProposalParams, ToolError> {
        let mut issues = Vec::new();
        let proposal_id = match self.proposal_id {
            Some(id) if id >= 1 => id,
            Some(_) => {
                issues.push("proposal_id must be a positive integer".to_string());
                0
            }
            None => {
                issues.push("proposal_id is required".to_string());
                0
            }
        };
        let decision = match self.decision.as_deref() {
            Some("approved") => ProposalStatus::Approved,
            Some("rejected") => ProposalStatus::Rejected,
            Some(other) => {
                issues.push(format!(
                    "decision must be approved or rejected (got {:?})",
                    other
                ));
                ProposalStatus::Pending
            }
            None => {
                issues.push("decision is required".to_string());
                ProposalStatus::Pending
            }
        };
        finish(
            ReviewProposalParams {
                proposal_id,
                decision,
                review_notes: self.review_notes,
            },
            issues,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListProposalsRequest {
    pub status: Option<String>,
}

impl ListProposalsRequest {
    pub fn validate(self) -> Result<Option<ProposalStatus>, ToolError> {
        match self.status.as_deref() {
            None => Ok(None),
            Some(raw) => match ProposalStatus::parse(raw) {
                Some(status) => Ok(Some(status)),
                None => Err(ToolError::validation(
                    "status must be one of: pending, approved, rejected",
                    "status",
                )),
            },
        }
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AddNodeRequest {
    pub name: Option<String>,
    pub label: Option<String>,
    pub properties: Option<Value>,
    pub insight_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AddNodeParams {
    pub name: String,
    pub label: String,
    pub properties: Value,
    pub insight_id: Option<InsightId>,
}

impl AddNodeRequest {
    pub fn validate(self) -> Result<AddNodeParams, ToolError> {
        let mut issues = Vec::new();
        let name = require(&self.name, "name", &mut issues)
            .map(|n| n.trim().to_string())
            .unwrap_or_default();
        if self.name.is_some() && name.is_empty() {
            issues.push("name must be non-empty".to_string());
        }
        let insight_id = match self.insight_id {
            None => None,
            Some(raw) => match InsightId::from_request(raw) {
                Ok(id) => Some(id),
                Err(err) => {
                    issues.push(err.to_string());
                    None
                }
            },
        };
        finish(
            AddNodeParams {
                name,
                label: self.label.unwrap_or_default(),
                properties: self.properties.unwrap_or_else(|| Value::Object(Default::default())),
                insight_id,
            },
            issues,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddEdgeRequest {
    pub source_name: Option<String>,
    pub target_name: Option<String>,
    pub relation: Option<String>,
    pub memory_sector: Option<String>,
    pub properties: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct AddEdgeParams {
    pub source_name: String,
    pub target_name: String,
    pub relation: String,
    pub memory_sector: Option<MemorySector>,
    pub properties: Value,
}

impl AddEdgeRequest {
    pub fn validate(self) -> Result<AddEdgeParams, ToolError> {
        let mut issues = Vec::new();
        let source = require(&self.source_name, "source_name", &mut issues)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let target = require(&self.target_name, "target_name", &mut issues)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let relation = require(&self.relation, "relation", &mut issues)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let sector = match self.memory_sector.as_deref() {
            None => None,
            Some(raw) => match MemorySector::parse(raw) {
                Some(sector) => Some(sector),
                None => {
                    issues.push(format!("memory_sector is not a known sector: {:?}", raw));
                    None
                }
            },
        };
        finish(
            AddEdgeParams {
                source_name: source,
                target_name: target,
                relation,
                memory_sector: sector,
                properties: self.properties.unwrap_or_else(|| Value::Object(Default::default())),
            },
            issues,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpandGraphRequest {
    pub node_names: Option<Vec<String>>,
    pub insight_ids: Option<Vec<i64>>,
    pub depth: Option<u32>,
    pub sector_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExpandGraphParams {
    pub seeds: engram_db::ExpansionSeeds,
    pub depth: u32,
    pub sector: Option<MemorySector>,
}

impl ExpandGraphRequest {
    pub fn validate(self) -> Result<ExpandGraphParams, ToolError> {
        let mut issues = Vec::new();

        let seeds = match (&self.node_names, &self.insight_ids) {
            (Some(names), None) if !names.is_empty() => {
                engram_db::ExpansionSeeds::Nodes(names.clone())
            }
            (None, Some(ids)) if !ids.is_empty() => {
                let mut parsed = Vec::with_capacity(ids.len());
                for raw in ids {
                    match InsightId::from_request(*raw) {
                        Ok(id) => parsed.push(id),
                        Err(err) => issues.push(err.to_string()),
                    }
                }
                engram_db::ExpansionSeeds::Insights(parsed)
            }
            (Some(_), Some(_)) => {
                issues.push("provide node_names or insight_ids, not both".to_string());
                engram_db::ExpansionSeeds::Nodes(Vec::new())
            }
            _ => {
                issues.push("one of node_names, insight_ids is required".to_string());
                engram_db::ExpansionSeeds::Nodes(Vec::new())
            }
        };

        let depth = self.depth.unwrap_or(1);
        if depth == 0 || depth > engram_db::MAX_EXPANSION_DEPTH {
            issues.push(format!(
                "depth must be between 1 and {}",
                engram_db::MAX_EXPANSION_DEPTH
            ));
        }

        let sector = match self.sector_filter.as_deref() {
            None => None,
            Some(raw) => match MemorySector::parse(raw) {
                Some(sector) => Some(sector),
                None => {
                    issues.push(format!("sector_filter is not a known sector: {:?}", raw));
                    None
                }
            },
        };

        finish(
            ExpandGraphParams {
                seeds,
                depth,
                sector,
            },
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delete_request_lists_all_issues_at_once() {
        let req: DeleteInsightRequest = from_args(json!({})).unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(err.message.contains("insight_id is required"));
        assert!(err.message.contains("actor is required"));
        assert!(err.message.contains("reason is required"));
    }

    #[test]
    fn delete_request_rejects_lowercase_io() {
        let req: DeleteInsightRequest = from_args(json!({
            "insight_id": 42, "actor": "io", "reason": "obsolete"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.message.contains("actor must be one of"));
    }

    #[test]
    fn delete_request_accepts_valid_input() {
        let req: DeleteInsightRequest = from_args(json!({
            "insight_id": 42, "actor": "I/O", "reason": "obsolete"
        }))
        .unwrap();
        let params = req.validate().unwrap();
        assert_eq!(params.insight_id.as_i64(), 42);
        assert_eq!(params.actor, Actor::Io);
    }

    #[test]
    fn update_requires_some_change() {
        let req: UpdateInsightRequest = from_args(json!({
            "insight_id": 1, "actor": "I/O", "reason": "tweak"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.message.contains("at least one of"));
    }

    #[test]
    fn update_bounds_memory_strength() {
        let req: UpdateInsightRequest = from_args(json!({
            "insight_id": 1, "actor": "I/O", "reason": "tweak", "new_memory_strength": 1.5
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.message.contains("within [0, 1]"));
    }

    #[test]
    fn feedback_rejects_unknown_type() {
        let req: SubmitFeedbackRequest = from_args(json!({
            "insight_id": 1, "feedback_type": "amazing"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.message.contains("feedback_type must be one of"));
    }

    #[test]
    fn expand_graph_needs_exactly_one_seed_kind() {
        let req: ExpandGraphRequest = from_args(json!({
            "node_names": ["a"], "insight_ids": [1]
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: ExpandGraphRequest = from_args(json!({})).unwrap();
        assert!(req.validate().is_err());

        let req: ExpandGraphRequest = from_args(json!({"node_names": ["a"]})).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn review_decision_is_a_closed_set() {
        let req: ReviewProposalRequest = from_args(json!({
            "proposal_id": 3, "decision": "maybe"
        }))
        .unwrap();
        let err = req.validate().unwrap_err();
        assert!(err.message.contains("approved or rejected"));
    }

    #[test]
    fn malformed_arguments_are_validation_errors() {
        let result: Result<DeleteInsightRequest, ToolError> =
            from_args(json!({"insight_id": "not-a-number"}));
        let err = result.unwrap_err();
        assert_eq!(err.code(), 400);
    }
}

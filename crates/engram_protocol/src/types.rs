//! Canonical domain enums and identifiers.
//!
//! Every closed value set in the system lives here with an `as_str`/`parse`
//! pair so storage and wire code never match on raw strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Embedding dimension used across all vector columns.
pub const EMBEDDING_DIM: usize = 1536;

/// `Display` via `as_str` for the string-backed enums below.
macro_rules! fmt_as_str {
    () => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.as_str())
        }
    };
}

/// Canonical insight identifier (positive, database-assigned).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct InsightId(i64);

impl InsightId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Validate a caller-supplied id. Ids are assigned by the database and
    /// start at 1; anything else is a validation failure, not a lookup miss.
    pub fn from_request(value: i64) -> Result<Self, InsightIdError> {
        if value < 1 {
            return Err(InsightIdError::NotPositive(value));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<InsightId> for i64 {
    fn from(value: InsightId) -> Self {
        value.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InsightIdError {
    #[error("insight_id must be a positive integer, got {0}")]
    NotPositive(i64),
}

/// Project access tier.
///
/// Controls the read set a caller resolves to. Writes are always scoped to
/// the caller's own project, regardless of tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Reads every project.
    Super,
    /// Reads its own project plus explicit read grants.
    Shared,
    /// Reads its own project only (default on registration).
    #[default]
    Isolated,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Super => "super",
            Self::Shared => "shared",
            Self::Isolated => "isolated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "super" => Some(Self::Super),
            "shared" => Some(Self::Shared),
            "isolated" => Some(Self::Isolated),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fmt_as_str!();
}

/// Access-control rollout phase for a project.
///
/// `Pending` is a no-op, `Shadow` records would-be violations without
/// blocking reads, `Enforcing` makes the predicates load-bearing. Unknown
/// projects resolve to `Enforcing` (the conservative default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutPhase {
    Pending,
    Shadow,
    Enforcing,
}

impl RolloutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shadow => "shadow",
            Self::Enforcing => "enforcing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "shadow" => Some(Self::Shadow),
            "enforcing" => Some(Self::Enforcing),
            _ => None,
        }
    }

    /// Severity rank used to pick the strictest phase across projects.
    pub fn strictness(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Shadow => 1,
            Self::Enforcing => 2,
        }
    }

    /// The stricter of two phases.
    pub fn max(self, other: Self) -> Self {
        if other.strictness() > self.strictness() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for RolloutPhase {
    fmt_as_str!();
}

/// Mutation actor.
///
/// `Io` is the privileged curator; its mutations execute immediately.
/// `Ethr` is non-privileged; destructive mutations it initiates become
/// pending proposals awaiting bilateral consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    Io,
    Ethr,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "I/O",
            Self::Ethr => "ethr",
        }
    }

    /// Case-sensitive: "io" or "ETHR" are rejected, matching the stored
    /// actor values exactly.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "I/O" => Some(Self::Io),
            "ethr" => Some(Self::Ethr),
            _ => None,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Io)
    }
}

impl fmt::Display for Actor {
    fmt_as_str!();
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown actor: {:?}", s)))
    }
}

/// Feedback submitted about a recalled insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// Boosts the insight's query-time score (+0.1 per event).
    Helpful,
    /// Lowers the insight's query-time score (-0.1 per event).
    NotRelevant,
    /// Stored for the record, no score effect.
    NotNow,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::NotRelevant => "not_relevant",
            Self::NotNow => "not_now",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "helpful" => Some(Self::Helpful),
            "not_relevant" => Some(Self::NotRelevant),
            "not_now" => Some(Self::NotNow),
            _ => None,
        }
    }
}

impl fmt::Display for FeedbackType {
    fmt_as_str!();
}

/// Categorical label on graph edges used for filtered traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemorySector {
    #[default]
    Semantic,
    Episodic,
    Procedural,
    Emotional,
}

impl MemorySector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Episodic => "episodic",
            Self::Procedural => "procedural",
            Self::Emotional => "emotional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "semantic" => Some(Self::Semantic),
            "episodic" => Some(Self::Episodic),
            "procedural" => Some(Self::Procedural),
            "emotional" => Some(Self::Emotional),
            _ => None,
        }
    }

    /// Classify an edge relation into a sector.
    ///
    /// Relations describing events land in episodic, how-to relations in
    /// procedural, affect relations in emotional, everything else semantic.
    pub fn classify_relation(relation: &str) -> Self {
        let lower = relation.to_ascii_lowercase();
        if lower.contains("happened")
            || lower.contains("occurred")
            || lower.contains("during")
            || lower.contains("recalled")
        {
            Self::Episodic
        } else if lower.contains("how_to") || lower.contains("step") || lower.contains("uses") {
            Self::Procedural
        } else if lower.contains("feels") || lower.contains("fears") || lower.contains("likes") {
            Self::Emotional
        } else {
            Self::Semantic
        }
    }
}

impl fmt::Display for MemorySector {
    fmt_as_str!();
}

/// Action recorded in an insight revision row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionAction {
    Update,
    Delete,
}

impl RevisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RevisionAction {
    fmt_as_str!();
}

/// Lifecycle state of a curation proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ProposalStatus {
    fmt_as_str!();
}

/// The mutation a proposal asks a privileged reviewer to approve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposedAction {
    DeleteInsight {
        insight_id: InsightId,
        reason: String,
    },
    UpdateInsight {
        insight_id: InsightId,
        new_content: Option<String>,
        new_memory_strength: Option<f64>,
        reason: String,
    },
}

impl ProposedAction {
    pub fn insight_id(&self) -> InsightId {
        match self {
            Self::DeleteInsight { insight_id, .. } => *insight_id,
            Self::UpdateInsight { insight_id, .. } => *insight_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeleteInsight { .. } => "DELETE_INSIGHT",
            Self::UpdateInsight { .. } => "UPDATE_INSIGHT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_parse_is_case_sensitive() {
        assert_eq!(Actor::parse("I/O"), Some(Actor::Io));
        assert_eq!(Actor::parse("ethr"), Some(Actor::Ethr));
        assert_eq!(Actor::parse("io"), None);
        assert_eq!(Actor::parse("ETHR"), None);
        assert_eq!(Actor::parse("invalid"), None);
    }

    #[test]
    fn phase_strictest_wins() {
        assert_eq!(
            RolloutPhase::Pending.max(RolloutPhase::Enforcing),
            RolloutPhase::Enforcing
        );
        assert_eq!(
            RolloutPhase::Shadow.max(RolloutPhase::Pending),
            RolloutPhase::Shadow
        );
        assert_eq!(
            RolloutPhase::Enforcing.max(RolloutPhase::Enforcing),
            RolloutPhase::Enforcing
        );
    }

    #[test]
    fn insight_id_rejects_non_positive() {
        assert!(InsightId::from_request(0).is_err());
        assert!(InsightId::from_request(-1).is_err());
        assert_eq!(InsightId::from_request(42).unwrap().as_i64(), 42);
    }

    #[test]
    fn proposed_action_round_trips() {
        let action = ProposedAction::DeleteInsight {
            insight_id: InsightId::new(42),
            reason: "clean-up".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "DELETE_INSIGHT");
        assert_eq!(json["insight_id"], 42);
        let back: ProposedAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn sector_classifier_defaults_to_semantic() {
        assert_eq!(
            MemorySector::classify_relation("RELATES_TO"),
            MemorySector::Semantic
        );
        assert_eq!(
            MemorySector::classify_relation("happened_during"),
            MemorySector::Episodic
        );
        assert_eq!(
            MemorySector::classify_relation("HOW_TO_DEPLOY"),
            MemorySector::Procedural
        );
    }

    #[test]
    fn access_level_default_is_isolated() {
        assert_eq!(AccessLevel::default(), AccessLevel::Isolated);
        assert_eq!(AccessLevel::parse("super"), Some(AccessLevel::Super));
        assert_eq!(AccessLevel::parse("SUPER"), None);
    }
}

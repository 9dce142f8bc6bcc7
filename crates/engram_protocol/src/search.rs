//! Wire types for hybrid search: candidates, results, filters.

use crate::types::MemorySector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which candidate generator produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Insight,
    Episode,
    Graph,
}

impl SourceType {
    pub const ALL: [Self; 3] = [Self::Insight, Self::Episode, Self::Graph];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insight => "insight",
            Self::Episode => "episode",
            Self::Graph => "graph",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insight" => Some(Self::Insight),
            "episode" => Some(Self::Episode),
            "graph" => Some(Self::Graph),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked row from a single candidate generator.
///
/// `id` is stable across variants and sources (`"insight:42"`), so fusion
/// can merge the same document found by different query variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    pub score: f64,
    pub source_type: SourceType,
    pub payload: Value,
}

impl SearchCandidate {
    pub fn new(source_type: SourceType, row_id: i64, score: f64, payload: Value) -> Self {
        Self {
            id: format!("{}:{}", source_type.as_str(), row_id),
            score,
            source_type,
            payload,
        }
    }

    /// The numeric row id behind the stable key, if it parses.
    pub fn row_id(&self) -> Option<i64> {
        self.id.rsplit(':').next()?.parse().ok()
    }
}

/// A fused, re-scored search hit as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f64,
    pub source_type: SourceType,
    pub payload: Value,
}

/// Full response of a hybrid search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// How many query variants were fused (original included).
    pub variants_fused: usize,
    pub total_candidates: usize,
}

/// Raw, caller-supplied filter options before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Empty list means "no tag constraint", not "match nothing".
    #[serde(default)]
    pub tags_filter: Option<Vec<String>>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    /// `None` means all source types.
    #[serde(default)]
    pub source_type_filter: Option<Vec<String>>,
    /// Applies to graph edges only.
    #[serde(default)]
    pub sector_filter: Option<MemorySector>,
}

/// Canonical filter spec produced by validation.
///
/// Tag and source-type constraints are normalised: an empty tags list has
/// already collapsed to `None`, and source types are parsed into the enum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub tags: Option<Vec<String>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub source_types: Option<Vec<SourceType>>,
    pub sector: Option<MemorySector>,
}

impl FilterSpec {
    /// Whether a candidate generator should run at all under this spec.
    pub fn includes_source(&self, source: SourceType) -> bool {
        match &self.source_types {
            None => true,
            Some(types) => types.contains(&source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_key_is_stable() {
        let c = SearchCandidate::new(SourceType::Insight, 42, 0.9, Value::Null);
        assert_eq!(c.id, "insight:42");
        assert_eq!(c.row_id(), Some(42));
    }

    #[test]
    fn filter_spec_includes_all_sources_by_default() {
        let spec = FilterSpec::default();
        for source in SourceType::ALL {
            assert!(spec.includes_source(source));
        }
    }

    #[test]
    fn filter_spec_restricts_sources() {
        let spec = FilterSpec {
            source_types: Some(vec![SourceType::Insight]),
            ..Default::default()
        };
        assert!(spec.includes_source(SourceType::Insight));
        assert!(!spec.includes_source(SourceType::Graph));
    }
}

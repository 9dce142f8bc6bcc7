//! Filter validation for hybrid search.
//!
//! Pure: no I/O, equal inputs produce equal outputs. Invalid input yields
//! one structured validation error listing every issue at once, so callers
//! fix their request in a single round.

use engram_protocol::{FilterOptions, FilterSpec, SourceType, ToolError};

/// Validate raw filter options into a canonical spec.
///
/// An empty `tags_filter` collapses to "no tag constraint" (never "match
/// nothing"); a `null` source-type filter means all sources; the date
/// range is inclusive and must be ordered.
pub fn validate_filters(options: &FilterOptions) -> Result<FilterSpec, ToolError> {
    let mut issues: Vec<String> = Vec::new();

    if let (Some(from), Some(to)) = (options.date_from, options.date_to) {
        if from > to {
            issues.push("date_from must be <= date_to".to_string());
        }
    }

    let tags = match &options.tags_filter {
        None => None,
        Some(tags) => {
            let invalid = tags.iter().filter(|t| t.trim().is_empty()).count();
            if invalid > 0 {
                issues.push("tags_filter entries must be non-empty strings".to_string());
            }
            if tags.is_empty() {
                None
            } else {
                Some(tags.clone())
            }
        }
    };

    let source_types = match &options.source_type_filter {
        None => None,
        Some(raw) => {
            let mut parsed = Vec::with_capacity(raw.len());
            let mut unknown = Vec::new();
            for name in raw {
                match SourceType::parse(name) {
                    Some(source) => {
                        if !parsed.contains(&source) {
                            parsed.push(source);
                        }
                    }
                    None => unknown.push(name.clone()),
                }
            }
            if !unknown.is_empty() {
                issues.push(format!(
                    "Invalid source types: {}. Must be one of: insight, episode, graph",
                    unknown.join(", ")
                ));
            }
            Some(parsed)
        }
    };

    if !issues.is_empty() {
        return Err(ToolError::validation_multi(&issues));
    }

    Ok(FilterSpec {
        tags,
        date_from: options.date_from,
        date_to: options.date_to,
        source_types,
        sector: options.sector_filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use engram_protocol::MemorySector;

    #[test]
    fn empty_options_pass() {
        let spec = validate_filters(&FilterOptions::default()).unwrap();
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn empty_tags_mean_no_constraint() {
        let options = FilterOptions {
            tags_filter: Some(vec![]),
            ..Default::default()
        };
        let spec = validate_filters(&options).unwrap();
        assert_eq!(spec.tags, None);
    }

    #[test]
    fn inverted_date_range_fails() {
        let options = FilterOptions {
            date_from: Some(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let err = validate_filters(&options).unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(err.message.contains("date_from must be <= date_to"));
    }

    #[test]
    fn unknown_source_types_fail() {
        let options = FilterOptions {
            source_type_filter: Some(vec!["insight".to_string(), "bogus".to_string()]),
            ..Default::default()
        };
        let err = validate_filters(&options).unwrap_err();
        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn all_issues_reported_together() {
        let options = FilterOptions {
            date_from: Some(Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            source_type_filter: Some(vec!["bogus".to_string()]),
            tags_filter: Some(vec!["".to_string()]),
            ..Default::default()
        };
        let err = validate_filters(&options).unwrap_err();
        assert!(err.message.contains("date_from"));
        assert!(err.message.contains("bogus"));
        assert!(err.message.contains("tags_filter"));
    }

    #[test]
    fn same_input_same_output() {
        let options = FilterOptions {
            tags_filter: Some(vec!["rust".to_string()]),
            sector_filter: Some(MemorySector::Episodic),
            ..Default::default()
        };
        let a = validate_filters(&options).unwrap();
        let b = validate_filters(&options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_source_types_collapse() {
        let options = FilterOptions {
            source_type_filter: Some(vec!["graph".to_string(), "graph".to_string()]),
            ..Default::default()
        };
        let spec = validate_filters(&options).unwrap();
        assert_eq!(spec.source_types, Some(vec![SourceType::Graph]));
    }
}

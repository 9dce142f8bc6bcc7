//! Configuration assembly: environment variables plus optional YAML knobs.
//!
//! Environment carries the essentials (`DATABASE_URL`, `OPENAI_API_KEY`,
//! `ENGRAM_PROJECT`, `ENGRAM_RLS_PHASE`); the YAML file carries tuning
//! knobs that rarely change. Env always wins over file values.

use anyhow::{Context, Result};
use engram_db::DbConfig;
use engram_protocol::RolloutPhase;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Optional knobs file (`engram.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Knobs {
    pub max_connections: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
    pub iterative_scan: Option<String>,
    pub max_scan_tuples: Option<i64>,
    pub working_memory_capacity: Option<i64>,
    pub shadow_log_sample_rate: Option<f64>,
}

impl Knobs {
    /// Load from the given path, the current directory, or the engram
    /// home, in that order. A missing file is an empty knob set.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.clone()],
            None => vec![
                PathBuf::from("engram.yaml"),
                engram_logging::engram_home().join("engram.yaml"),
            ],
        };

        for path in candidates {
            if path.exists() {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let knobs: Knobs = serde_yaml::from_str(&raw)
                    .with_context(|| format!("Invalid knobs file {}", path.display()))?;
                debug!(path = %path.display(), "loaded knobs file");
                return Ok(knobs);
            }
        }
        Ok(Self::default())
    }
}

/// Build the storage config from `DATABASE_URL`, the knobs file, and the
/// `ENGRAM_RLS_PHASE` override.
pub fn db_config(knobs: &Knobs) -> Result<DbConfig> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let mut config = DbConfig::new(url);

    if let Some(max) = knobs.max_connections {
        config.max_connections = max;
    }
    if let Some(ms) = knobs.acquire_timeout_ms {
        config.acquire_timeout = Duration::from_millis(ms);
    }
    if let Some(scan) = &knobs.iterative_scan {
        config.iterative_scan = scan.clone();
    }
    if let Some(tuples) = knobs.max_scan_tuples {
        config.max_scan_tuples = tuples;
    }
    if let Some(capacity) = knobs.working_memory_capacity {
        config.working_memory_capacity = capacity;
    }
    if let Some(rate) = knobs.shadow_log_sample_rate {
        config.shadow_log_sample_rate = rate.clamp(0.0, 1.0);
    }

    if let Ok(phase) = std::env::var("ENGRAM_RLS_PHASE") {
        config.phase_override = RolloutPhase::parse(&phase);
        if config.phase_override.is_none() && !phase.is_empty() {
            anyhow::bail!(
                "ENGRAM_RLS_PHASE must be one of pending, shadow, enforcing (got {:?})",
                phase
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_knobs_file_is_empty() {
        let knobs = Knobs::load(None).unwrap();
        assert!(knobs.max_connections.is_none());
    }

    #[test]
    fn knobs_override_db_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp.as_file(),
            "max_connections: 3\nmax_scan_tuples: 5000\nshadow_log_sample_rate: 0.25"
        )
        .unwrap();
        let knobs = Knobs::load(Some(&tmp.path().to_path_buf())).unwrap();

        std::env::set_var("DATABASE_URL", "postgres://localhost/engram_test");
        let config = db_config(&knobs).unwrap();
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.max_scan_tuples, 5000);
        assert!((config.shadow_log_sample_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn unknown_knob_keys_are_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp.as_file(), "not_a_knob: true").unwrap();
        assert!(Knobs::load(Some(&tmp.path().to_path_buf())).is_err());
    }
}

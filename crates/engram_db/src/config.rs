//! Storage configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Database configuration.
///
/// The vector-scan knobs are applied per acquired connection and favour
/// recall on filtered vector queries over raw index speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// How long an acquire may wait before failing with a capacity error.
    #[serde(with = "duration_millis")]
    pub acquire_timeout: Duration,
    /// pgvector iterative scan mode (`relaxed_order` favours recall).
    pub iterative_scan: String,
    /// Upper bound on tuples an iterative vector scan may visit.
    pub max_scan_tuples: i64,
    /// Per-project working-memory capacity before LRU eviction.
    pub working_memory_capacity: i64,
    /// Probability that a shadow-phase violation is recorded.
    pub shadow_log_sample_rate: f64,
    /// Forces every session into this rollout phase when set
    /// (`ENGRAM_RLS_PHASE`).
    #[serde(default)]
    pub phase_override: Option<engram_protocol::RolloutPhase>,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(3),
            iterative_scan: "relaxed_order".to_string(),
            max_scan_tuples: 20_000,
            working_memory_capacity: 50,
            shadow_log_sample_rate: 1.0,
            phase_override: None,
        }
    }

    /// Read `DATABASE_URL` from the environment.
    pub fn from_env() -> Option<Self> {
        std::env::var("DATABASE_URL").ok().map(Self::new)
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favour_recall() {
        let config = DbConfig::new("postgres://localhost/engram");
        assert_eq!(config.iterative_scan, "relaxed_order");
        assert!(config.max_scan_tuples > 0);
        assert!(config.acquire_timeout <= Duration::from_secs(5));
    }
}

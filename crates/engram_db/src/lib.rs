//! Postgres storage adapter for the Engram memory service.
//!
//! All persisted rows parse into typed records at this boundary; business
//! code never inspects rows by string key. Every connection handed out has
//! the caller's current project and the vector-scan knobs applied, and any
//! mutation that writes a revision row is committed in the same transaction
//! as that revision.
//!
//! # Example
//!
//! ```rust,ignore
//! use engram_db::{DbConfig, EngramDb};
//!
//! let db = EngramDb::connect(DbConfig::new(url)).await?;
//! db.migrate().await?;
//!
//! let session = db.session(Some("sm")).await?;
//! let insight = session.get_insight(InsightId::new(1)).await?;
//! ```

pub mod candidates;
pub mod config;
pub mod error;
pub mod feedback;
pub mod graph;
pub mod insights;
pub mod memory;
pub mod proposals;
pub mod projects;
pub mod rows;
pub mod session;
pub mod stats;

pub use config::DbConfig;
pub use error::{DbError, Result};
pub use graph::{ExpansionSeeds, MAX_EXPANSION_DEPTH};
pub use insights::UpdateOutcome;
pub use proposals::ReviewOutcome;
pub use rows::{
    EdgeRow, EpisodeRow, FeedbackTally, InsightRow, MemoryCounts, NodeRow, ProjectRow,
    ProposalRow, RevisionRow, RolloutStatusRow, WorkingMemoryRow,
};
pub use session::{AccessPolicy, Session};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Embedded schema migrations, numbered monotonically. Destructive steps
/// carry `.down.sql` rollback scripts.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle to the Engram database.
///
/// Cheap to clone; the underlying pool is shared and strictly bounded.
/// Pool exhaustion surfaces as a fast [`DbError::Capacity`], never a wait
/// beyond the configured acquire timeout.
#[derive(Clone)]
pub struct EngramDb {
    pool: PgPool,
    config: DbConfig,
}

impl EngramDb {
    /// Connect and build the bounded pool.
    pub async fn connect(config: DbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self { pool, config })
    }

    /// Build the pool without connecting. Connections are established on
    /// first use; acquisition still fails fast once the pool is saturated.
    pub fn connect_lazy(config: DbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.url)?;
        Ok(Self { pool, config })
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Open a session for one tool invocation.
    ///
    /// Resolves the caller's access policy exactly once (tier, read set,
    /// strictest rollout phase); every query issued through the session
    /// reuses that resolution.
    pub async fn session(&self, current_project: Option<&str>) -> Result<Session> {
        let policy = AccessPolicy::resolve(&self.pool, current_project)
            .await?
            .with_phase_override(self.config.phase_override);
        Ok(Session::new(self.pool.clone(), self.config.clone(), policy))
    }

    /// Open a session with the emergency bypass asserted.
    ///
    /// Disables the read predicates entirely. Callers must hold the
    /// elevated role; the assumption itself is logged.
    pub async fn bypass_session(&self, operator: &str) -> Result<Session> {
        tracing::warn!(operator, "emergency bypass asserted: access predicates disabled");
        let policy = AccessPolicy::bypass();
        Ok(Session::new(self.pool.clone(), self.config.clone(), policy))
    }
}

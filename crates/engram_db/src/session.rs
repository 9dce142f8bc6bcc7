//! Per-invocation sessions: access policy plus connection setup.
//!
//! A [`Session`] is opened once per tool invocation. It resolves the
//! caller's [`AccessPolicy`] a single time (tier, read set, strictest
//! rollout phase) and applies the session state (current project and
//! vector-scan knobs) to every connection it hands out.

use crate::config::DbConfig;
use crate::error::{DbError, Result};
use engram_protocol::{AccessLevel, RolloutPhase};
use rand::Rng;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

/// Upper bound on shadow-violation rows recorded for a single query.
const SHADOW_LOG_PER_QUERY_CAP: usize = 16;

/// The caller's resolved access rights, memoised for one invocation.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    current_project: Option<String>,
    access_level: AccessLevel,
    phase: RolloutPhase,
    allowed: Vec<String>,
    bypass: bool,
}

impl AccessPolicy {
    /// Resolve the policy for a caller.
    ///
    /// Unknown projects resolve to the most restrictive combination
    /// (isolated tier, enforcing phase). A missing current project yields
    /// an empty read set, so reads come back empty and writes fail the
    /// precondition check.
    pub async fn resolve(pool: &PgPool, current_project: Option<&str>) -> Result<Self> {
        let Some(current) = current_project else {
            return Ok(Self {
                current_project: None,
                access_level: AccessLevel::Isolated,
                phase: RolloutPhase::Enforcing,
                allowed: Vec::new(),
                bypass: false,
            });
        };

        let access_level: Option<String> =
            sqlx::query_scalar("SELECT access_level FROM project_registry WHERE project_id = $1")
                .bind(current)
                .fetch_optional(pool)
                .await?;
        let access_level = access_level
            .as_deref()
            .and_then(AccessLevel::parse)
            .unwrap_or(AccessLevel::Isolated);

        let allowed = match access_level {
            AccessLevel::Super => {
                sqlx::query_scalar("SELECT project_id FROM project_registry ORDER BY project_id")
                    .fetch_all(pool)
                    .await?
            }
            AccessLevel::Shared => {
                // Self-grants are implicit; the own project leads the set.
                let mut projects: Vec<String> = sqlx::query_scalar(
                    "SELECT target FROM project_read_grants WHERE reader = $1 ORDER BY target",
                )
                .bind(current)
                .fetch_all(pool)
                .await?;
                projects.retain(|p| p != current);
                projects.insert(0, current.to_string());
                projects
            }
            AccessLevel::Isolated => vec![current.to_string()],
        };

        let phase = Self::strictest_phase(pool, &allowed).await?;

        debug!(
            project = current,
            level = access_level.as_str(),
            phase = phase.as_str(),
            readable = allowed.len(),
            "resolved access policy"
        );

        Ok(Self {
            current_project: Some(current.to_string()),
            access_level,
            phase,
            allowed,
            bypass: false,
        })
    }

    /// The strictest phase across the caller's candidate projects.
    /// Projects without a rollout row count as enforcing; a disabled row
    /// counts as pending (legacy behaviour).
    async fn strictest_phase(pool: &PgPool, projects: &[String]) -> Result<RolloutPhase> {
        let rows: Vec<(String, String, bool)> = sqlx::query_as(
            "SELECT project_id, phase, enabled FROM rls_migration_status \
             WHERE project_id = ANY($1)",
        )
        .bind(projects)
        .fetch_all(pool)
        .await?;

        if rows.len() < projects.len() {
            return Ok(RolloutPhase::Enforcing);
        }

        let mut phase = RolloutPhase::Pending;
        for (_, phase_str, enabled) in rows {
            let row_phase = if enabled {
                RolloutPhase::parse(&phase_str).unwrap_or(RolloutPhase::Enforcing)
            } else {
                RolloutPhase::Pending
            };
            phase = phase.max(row_phase);
        }
        Ok(phase)
    }

    /// Emergency bypass: no predicates at all. Assumption is logged by the
    /// caller holding the elevated role.
    pub fn bypass() -> Self {
        Self {
            current_project: None,
            access_level: AccessLevel::Super,
            phase: RolloutPhase::Pending,
            allowed: Vec::new(),
            bypass: true,
        }
    }

    /// Force a rollout phase (configuration override).
    pub fn with_phase_override(mut self, phase: Option<RolloutPhase>) -> Self {
        if let Some(phase) = phase {
            self.phase = phase;
        }
        self
    }

    /// The current project, or a precondition error for sessions opened
    /// without one. Every write path calls this first.
    pub fn current(&self) -> Result<&str> {
        self.current_project
            .as_deref()
            .ok_or_else(|| DbError::precondition("No current project set for this session"))
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn phase(&self) -> RolloutPhase {
        self.phase
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// The project set to constrain reads to, or `None` when reads are
    /// unrestricted (pending/shadow phase or emergency bypass).
    ///
    /// A session without a current project returns an empty slice: reads
    /// match nothing.
    pub fn read_set(&self) -> Option<&[String]> {
        if self.bypass {
            return None;
        }
        if self.current_project.is_none() {
            return Some(&[]);
        }
        match self.phase {
            RolloutPhase::Enforcing => Some(&self.allowed),
            RolloutPhase::Pending | RolloutPhase::Shadow => None,
        }
    }

    /// Whether would-be violations should be recorded instead of enforced.
    pub fn in_shadow(&self) -> bool {
        !self.bypass && self.phase == RolloutPhase::Shadow && self.current_project.is_some()
    }

    pub fn allows_read(&self, project: &str) -> bool {
        self.bypass || self.allowed.iter().any(|p| p == project)
    }
}

/// A session scoped to one tool invocation.
pub struct Session {
    pool: PgPool,
    config: DbConfig,
    policy: AccessPolicy,
}

impl Session {
    pub fn new(pool: PgPool, config: DbConfig, policy: AccessPolicy) -> Self {
        Self {
            pool,
            config,
            policy,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Acquire a connection with the session state applied.
    ///
    /// Acquisition fails fast with [`DbError::Capacity`] when the pool is
    /// exhausted. Callers must not hold the connection across external I/O
    /// such as the embedding call.
    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        let mut conn = self.pool.acquire().await?;
        self.apply_session_state(&mut conn, false).await?;
        Ok(conn)
    }

    /// Begin a transaction with the session state applied locally.
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        self.apply_session_state(&mut *tx, true).await?;
        Ok(tx)
    }

    async fn apply_session_state(&self, conn: &mut sqlx::PgConnection, local: bool) -> Result<()> {
        let current = match self.policy.current() {
            Ok(project) => project,
            Err(_) => "",
        };
        sqlx::query(
            "SELECT set_config('app.current_project', $1, $4), \
                    set_config('hnsw.iterative_scan', $2, $4), \
                    set_config('hnsw.max_scan_tuples', $3, $4)",
        )
        .bind(current)
        .bind(&self.config.iterative_scan)
        .bind(self.config.max_scan_tuples.to_string())
        .bind(local)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record would-be read violations observed in shadow phase.
    ///
    /// Sampled by the configured rate and capped per query so the log
    /// table stays bounded. Only project identifiers are recorded, never
    /// row payloads.
    pub(crate) async fn note_shadow_rows<'a>(
        &self,
        table: &str,
        row_projects: impl IntoIterator<Item = &'a str>,
    ) {
        if !self.policy.in_shadow() {
            return;
        }

        let mut outside: Vec<&str> = row_projects
            .into_iter()
            .filter(|p| !self.policy.allows_read(p))
            .collect();
        if outside.is_empty() {
            return;
        }
        outside.sort_unstable();
        outside.dedup();
        outside.truncate(SHADOW_LOG_PER_QUERY_CAP);

        if self.config.shadow_log_sample_rate < 1.0
            && rand::thread_rng().gen::<f64>() >= self.config.shadow_log_sample_rate
        {
            return;
        }

        let caller = self.policy.current().unwrap_or("").to_string();
        let row_projects: Vec<String> = outside.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query(
            "INSERT INTO rls_shadow_violations (table_name, row_project, caller_project) \
             SELECT $1, p, $2 FROM UNNEST($3::text[]) AS p",
        )
        .bind(table)
        .bind(&caller)
        .bind(&row_projects)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => warn!(
                table,
                %caller,
                projects = ?row_projects,
                "shadow phase: recorded would-be access violation"
            ),
            // The shadow log is advisory; never fail the read over it.
            Err(err) => debug!(table, %err, "failed to record shadow violation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(phase: RolloutPhase, current: Option<&str>, allowed: &[&str]) -> AccessPolicy {
        AccessPolicy {
            current_project: current.map(str::to_string),
            access_level: AccessLevel::Isolated,
            phase,
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            bypass: false,
        }
    }

    #[test]
    fn missing_project_reads_nothing_and_writes_fail() {
        let p = policy(RolloutPhase::Enforcing, None, &[]);
        assert_eq!(p.read_set(), Some(&[][..]));
        assert!(matches!(p.current(), Err(DbError::Precondition(_))));
    }

    #[test]
    fn enforcing_restricts_to_allowed_set() {
        let p = policy(RolloutPhase::Enforcing, Some("sm"), &["sm", "aa"]);
        let set = p.read_set().expect("restricted");
        assert_eq!(set, &["sm".to_string(), "aa".to_string()][..]);
        assert!(p.allows_read("aa"));
        assert!(!p.allows_read("io"));
    }

    #[test]
    fn shadow_leaves_reads_unrestricted() {
        let p = policy(RolloutPhase::Shadow, Some("sm"), &["sm"]);
        assert_eq!(p.read_set(), None);
        assert!(p.in_shadow());
    }

    #[test]
    fn bypass_disables_everything() {
        let p = AccessPolicy::bypass();
        assert_eq!(p.read_set(), None);
        assert!(!p.in_shadow());
        assert!(p.allows_read("anything"));
    }
}

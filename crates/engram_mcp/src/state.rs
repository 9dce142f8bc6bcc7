//! Process-wide server state.
//!
//! The pool and the embedding gateway are initialised once at startup and
//! shared by every invocation; the only per-server mutable state is the
//! session's current project.

use engram_db::{DbError, EngramDb, Session};
use engram_protocol::{ErrorKind, ToolError};
use engram_search::HybridSearch;
use tokio::sync::RwLock;
use tracing::error;

/// Shared state behind every tool handler.
pub struct ServerState {
    pub db: EngramDb,
    pub search: HybridSearch,
    project: RwLock<Option<String>>,
}

impl ServerState {
    pub fn new(db: EngramDb, search: HybridSearch, initial_project: Option<String>) -> Self {
        Self {
            db,
            search,
            project: RwLock::new(initial_project),
        }
    }

    pub async fn current_project(&self) -> Option<String> {
        self.project.read().await.clone()
    }

    pub async fn set_current_project(&self, project: String) {
        *self.project.write().await = Some(project);
    }

    /// Open a storage session for one invocation, resolving the access
    /// policy once.
    pub async fn session(&self) -> Result<Session, ToolError> {
        let project = self.current_project().await;
        self.db
            .session(project.as_deref())
            .await
            .map_err(storage_error)
    }
}

/// Map a storage failure onto the tool envelope, logging internal detail
/// that must not cross the boundary.
pub fn storage_error(err: DbError) -> ToolError {
    let tool = err.to_tool_error();
    if tool.kind == ErrorKind::Fatal {
        error!(%err, "storage failure");
    }
    tool
}

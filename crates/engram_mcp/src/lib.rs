//! Tool-protocol server for the Engram memory service.
//!
//! Exposes the retrieval and curation engine as named tools over JSON-RPC
//! stdio:
//!
//! - **Context**: set_project_context
//! - **Ingestion**: store_insight, graph_add_node, graph_add_edge
//! - **Retrieval**: hybrid_search, expand_graph, count_by_type
//! - **Curation**: update_insight, delete_insight, get_insight_history,
//!   submit_insight_feedback
//! - **Consent**: list_proposals, review_proposal
//!
//! Handlers receive typed request structs, validate every field at once,
//! and answer either a result object or the structured error envelope
//! (`{"error": {"code", "message", "field"?}}`, codes 400/404/409/500).

pub mod protocol;
pub mod server;
pub mod state;
pub mod tools;
pub mod types;

pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolDefinition};
pub use server::{McpServer, McpServerConfig};
pub use state::ServerState;

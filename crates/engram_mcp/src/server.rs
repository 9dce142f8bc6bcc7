//! Tool server: JSON-RPC 2.0 over stdio.
//!
//! The read loop parses newline-delimited frames from stdin and answers on
//! stdout through a single writer task. Tool calls run as independent
//! tasks, so many invocations proceed concurrently; each carries a
//! deadline, and a timed-out call is dropped at its next suspension point,
//! which releases its connection and rolls back any open transaction.

use crate::protocol::{
    methods, ErrorCode, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability,
    ToolsListResult, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::state::ServerState;
use crate::tools;
use anyhow::{Context, Result};
use engram_protocol::ToolError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name reported in initialize.
    pub server_name: String,
    /// Server version reported in initialize.
    pub server_version: String,
    /// Deadline applied to every tool call.
    pub request_deadline: Duration,
    /// Project context to start the session with (`ENGRAM_PROJECT`).
    pub initial_project: Option<String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "engram".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            request_deadline: Duration::from_secs(30),
            initial_project: std::env::var("ENGRAM_PROJECT").ok().filter(|p| !p.is_empty()),
        }
    }
}

/// The tool server.
pub struct McpServer {
    config: McpServerConfig,
    state: Arc<ServerState>,
}

impl McpServer {
    pub fn new(config: McpServerConfig, state: ServerState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Serve until stdin closes.
    pub async fn run(&self) -> Result<()> {
        info!(
            name = %self.config.server_name,
            version = %self.config.server_version,
            "tool server starting on stdio"
        );

        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);

        // Single writer task: stdout carries protocol frames only.
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(response) = rx.recv().await {
                let mut line = match serde_json::to_string(&response) {
                    Ok(line) => line,
                    Err(err) => {
                        error!(%err, "failed to serialise response");
                        continue;
                    }
                };
                line.push('\n');
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdout.flush().await;
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("stdin read failed")? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(err) => {
                    debug!(%err, "unparseable frame");
                    let _ = tx
                        .send(JsonRpcResponse::error(
                            None,
                            JsonRpcError::new(ErrorCode::ParseError, "Invalid JSON"),
                        ))
                        .await;
                    continue;
                }
            };

            self.handle(request, tx.clone()).await;
        }

        drop(tx);
        let _ = writer.await;
        info!("stdin closed, tool server stopping");
        Ok(())
    }

    async fn handle(&self, request: JsonRpcRequest, tx: mpsc::Sender<JsonRpcResponse>) {
        if request.jsonrpc != JSONRPC_VERSION {
            let _ = tx
                .send(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidRequest, "jsonrpc must be \"2.0\""),
                ))
                .await;
            return;
        }

        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: Some(false),
                        }),
                    },
                    server_info: ServerInfo {
                        name: self.config.server_name.clone(),
                        version: self.config.server_version.clone(),
                    },
                };
                let _ = tx
                    .send(JsonRpcResponse::success(
                        request.id,
                        serde_json::to_value(result).unwrap_or(Value::Null),
                    ))
                    .await;
            }
            methods::INITIALIZED => {
                debug!("client initialized");
            }
            methods::PING => {
                let _ = tx
                    .send(JsonRpcResponse::success(request.id, json!({})))
                    .await;
            }
            methods::TOOLS_LIST => {
                let result = ToolsListResult {
                    tools: tools::definitions(),
                };
                let _ = tx
                    .send(JsonRpcResponse::success(
                        request.id,
                        serde_json::to_value(result).unwrap_or(Value::Null),
                    ))
                    .await;
            }
            methods::TOOLS_CALL => {
                self.spawn_tool_call(request, tx).await;
            }
            other => {
                if request.is_notification() {
                    debug!(method = other, "ignoring notification");
                    return;
                }
                let _ = tx
                    .send(JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::new(
                            ErrorCode::MethodNotFound,
                            format!("Unknown method: {}", other),
                        ),
                    ))
                    .await;
            }
        }
    }

    /// Run one tool call as its own task so slow calls never block the
    /// read loop. Panics surface as a generic internal error.
    async fn spawn_tool_call(&self, request: JsonRpcRequest, tx: mpsc::Sender<JsonRpcResponse>) {
        let id = request.id.clone();
        let params: ToolCallParams = match request
            .params
            .ok_or(())
            .and_then(|p| serde_json::from_value(p).map_err(|_| ()))
        {
            Ok(params) => params,
            Err(()) => {
                let _ = tx
                    .send(JsonRpcResponse::error(
                        id,
                        JsonRpcError::new(ErrorCode::InvalidParams, "Missing tool name"),
                    ))
                    .await;
                return;
            }
        };

        let state = Arc::clone(&self.state);
        let deadline = self.config.request_deadline;
        let call_id = id.clone();
        let handle = tokio::spawn(async move {
            execute_tool_call(&state, &params.name, params.arguments, deadline).await
        });

        tokio::spawn(async move {
            let response = match handle.await {
                Ok(result) => JsonRpcResponse::success(call_id, result),
                Err(join_err) => {
                    error!(%join_err, "tool task failed");
                    JsonRpcResponse::success(
                        call_id,
                        tool_failure(&ToolError::fatal()),
                    )
                }
            };
            let _ = tx.send(response).await;
        });
    }
}

/// Execute one tool under its deadline and wrap the outcome as a tool-call
/// result. Handler failures ride inside a successful JSON-RPC response as
/// the structured envelope.
async fn execute_tool_call(
    state: &ServerState,
    name: &str,
    arguments: Value,
    deadline: Duration,
) -> Value {
    debug!(tool = name, "tool call started");
    let outcome = match tokio::time::timeout(deadline, tools::dispatch(name, state, arguments))
        .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = name, deadline_ms = deadline.as_millis() as u64, "tool call timed out");
            Err(ToolError::transient("Request deadline exceeded"))
        }
    };

    match outcome {
        Ok(value) => {
            debug!(tool = name, "tool call succeeded");
            serde_json::to_value(ToolCallResult::from_value(&value, false))
                .unwrap_or(Value::Null)
        }
        Err(err) => {
            debug!(tool = name, code = err.code(), "tool call failed");
            tool_failure(&err)
        }
    }
}

fn tool_failure(err: &ToolError) -> Value {
    let envelope = serde_json::to_value(err.to_envelope()).unwrap_or(Value::Null);
    serde_json::to_value(ToolCallResult::from_value(&envelope, true)).unwrap_or(Value::Null)
}

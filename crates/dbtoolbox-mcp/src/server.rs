//! MCP request dispatch.
//!
//! The server is transport-agnostic: the stdio and HTTP transports hand it
//! raw messages along with whatever auth claims they could verify.

use std::sync::Arc;

use dbtoolbox_core::ClaimsMap;
use dbtoolbox_runtime::{ToolError, Toolbox, Toolset};
use serde_json::{Value, json};

use crate::error::McpError;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, JSONRPC_VERSION, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, SERVER_NAME, negotiate_version,
};

/// The MCP server for one toolset.
#[derive(Clone)]
pub struct McpServer {
    toolbox: Arc<Toolbox>,
    toolset: String,
}

impl McpServer {
    /// Serve the default toolset.
    pub fn new(toolbox: Arc<Toolbox>) -> Self {
        Self {
            toolbox,
            toolset: Toolbox::DEFAULT_TOOLSET.to_string(),
        }
    }

    /// Serve a named toolset instead.
    pub fn with_toolset(mut self, toolset: impl Into<String>) -> Self {
        self.toolset = toolset.into();
        self
    }

    pub fn toolbox(&self) -> &Arc<Toolbox> {
        &self.toolbox
    }

    /// Handle one raw JSON-RPC message. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str, claims: &ClaimsMap) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return Some(McpError::from(e).into_response(None)),
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => return Some(McpError::InvalidRequest(e.to_string()).into_response(id)),
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(
                McpError::InvalidRequest(format!("unsupported jsonrpc version \"{}\"", request.jsonrpc))
                    .into_response(request.id),
            );
        }

        self.handle_request(request, claims).await
    }

    /// Handle a parsed request. Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        claims: &ClaimsMap,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        }

        let id = request.id.clone();
        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params, claims).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::debug!(method = %request.method, error = %e, "MCP request failed");
                e.into_response(id)
            }
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(params) => {
                serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?
            }
            None => InitializeParams::default(),
        };

        let version = negotiate_version(params.protocol_version.as_deref());
        tracing::info!(
            requested = ?params.protocol_version,
            protocol_version = version,
            "MCP session initialized"
        );

        Ok(json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    fn toolset(&self) -> Result<&Toolset, McpError> {
        self.toolbox
            .toolset(&self.toolset)
            .ok_or_else(|| McpError::ToolsetNotFound(self.toolset.clone()))
    }

    fn list_tools(&self) -> Result<Value, McpError> {
        let tools = self
            .toolset()?
            .tools()
            .iter()
            .map(|tool| tool.mcp_manifest().clone())
            .collect();

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn call_tool(&self, params: Option<Value>, claims: &ClaimsMap) -> Result<Value, McpError> {
        let params: CallToolParams = params
            .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))
            .and_then(|p| serde_json::from_value(p).map_err(|e| McpError::InvalidParams(e.to_string())))?;

        if !self.toolset()?.tools().iter().any(|t| t.name() == params.name) {
            return Err(McpError::ToolNotFound(params.name));
        }

        let result = match self.toolbox.invoke(&params.name, &params.arguments, claims).await {
            Ok(value) => CallToolResult::from_value(&value),
            Err(ToolError::NotFound(name)) => return Err(McpError::ToolNotFound(name)),
            Err(e @ ToolError::Unauthorized) => return Err(McpError::Unauthorized(e.to_string())),
            Err(e) => CallToolResult::error(e.to_string()),
        };

        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

//! The `Tool` seam shared by every tool kind.

use async_trait::async_trait;
use dbtoolbox_core::{ClaimsMap, Manifest, McpManifest, ParamValues, ToolKind};
use dbtoolbox_sources::JsonRow;
use serde_json::{Map, Value};

use crate::error::ToolError;

/// A configured, ready-to-invoke tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ToolKind;

    /// Resolve request arguments and verified claims into parameter values.
    fn parse_params(&self, data: &Map<String, Value>, claims: &ClaimsMap) -> Result<ParamValues, ToolError>;

    /// Run the tool. The result is `null` when the statement produced no rows.
    async fn invoke(&self, params: ParamValues) -> Result<Value, ToolError>;

    fn manifest(&self) -> &Manifest;

    fn mcp_manifest(&self) -> &McpManifest;

    /// Whether a caller holding tokens for `verified_services` may invoke this tool.
    fn authorized(&self, verified_services: &[String]) -> bool;
}

/// Tool-level `authRequired` check: no requirement, or any listed service verified.
pub fn is_authorized(auth_required: &[String], verified_services: &[String]) -> bool {
    auth_required.is_empty() || auth_required.iter().any(|s| verified_services.contains(s))
}

/// Turn driver rows into a tool result.
pub fn rows_to_result(rows: Vec<JsonRow>) -> Value {
    if rows.is_empty() {
        Value::Null
    } else {
        Value::Array(rows.into_iter().map(Value::Object).collect())
    }
}

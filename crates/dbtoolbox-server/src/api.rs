//! REST API: tool manifests and tool invocation under `/api`.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use dbtoolbox_core::Manifest;
use dbtoolbox_mcp::request_claims;
use dbtoolbox_runtime::Toolbox;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResponse {
    pub server_version: &'static str,
    pub tools: BTreeMap<String, Manifest>,
}

impl ManifestResponse {
    fn new(tools: BTreeMap<String, Manifest>) -> Self {
        Self {
            server_version: env!("CARGO_PKG_VERSION"),
            tools,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/toolset", get(default_toolset))
        .route("/toolset/{name}", get(named_toolset))
        .route("/tool/{name}", get(tool_manifest))
        .route("/tool/{name}/invoke", post(invoke_tool))
}

async fn default_toolset(State(state): State<AppState>) -> Result<Json<ManifestResponse>, ApiError> {
    toolset_manifest(&state.toolbox, Toolbox::DEFAULT_TOOLSET)
}

async fn named_toolset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ManifestResponse>, ApiError> {
    toolset_manifest(&state.toolbox, &name)
}

fn toolset_manifest(toolbox: &Toolbox, name: &str) -> Result<Json<ManifestResponse>, ApiError> {
    let toolset = toolbox
        .toolset(name)
        .ok_or_else(|| ApiError::not_found(format!("toolset \"{}\" does not exist", name)))?;
    Ok(Json(ManifestResponse::new(toolset.manifests())))
}

async fn tool_manifest(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ManifestResponse>, ApiError> {
    let tool = state
        .toolbox
        .tool(&name)
        .ok_or_else(|| ApiError::not_found(format!("tool \"{}\" does not exist", name)))?;

    let mut tools = BTreeMap::new();
    tools.insert(name, tool.manifest().clone());
    Ok(Json(ManifestResponse::new(tools)))
}

async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let data: Map<String, Value> = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("unable to parse request body: {}", e)))?
    };

    let claims = request_claims(&state.toolbox, &headers).await;
    let result = state.toolbox.invoke(&name, &data, &claims).await?;

    let encoded = serde_json::to_string(&result).map_err(|e| {
        ApiError::new(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("unable to serialize result: {}", e),
        )
    })?;
    tracing::debug!(tool = %name, bytes = encoded.len(), "Tool invoked");

    Ok(Json(json!({ "result": encoded })))
}

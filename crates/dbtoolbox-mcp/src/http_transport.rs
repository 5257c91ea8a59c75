//! HTTP transport for the MCP server.
//!
//! JSON-RPC messages are POSTed to `/mcp` (default toolset) or
//! `/mcp/{toolset}`. Auth service tokens travel in `<name>_token` headers,
//! exactly as on the REST API.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use dbtoolbox_core::ClaimsMap;
use dbtoolbox_runtime::Toolbox;

use crate::error::McpError;
use crate::server::McpServer;

/// Verify every auth service token carried in `headers`.
pub async fn request_claims(toolbox: &Toolbox, headers: &HeaderMap) -> ClaimsMap {
    toolbox
        .claims_from_headers(|name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .await
}

/// Create the HTTP router for MCP.
pub fn create_router(toolbox: Arc<Toolbox>) -> Router {
    Router::new()
        .route("/mcp", post(handle_default_toolset))
        .route("/mcp/{toolset}", post(handle_named_toolset))
        .with_state(toolbox)
}

async fn handle_default_toolset(
    State(toolbox): State<Arc<Toolbox>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    handle(toolbox, Toolbox::DEFAULT_TOOLSET, headers, body).await
}

async fn handle_named_toolset(
    State(toolbox): State<Arc<Toolbox>>,
    Path(toolset): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    handle(toolbox, &toolset, headers, body).await
}

async fn handle(toolbox: Arc<Toolbox>, toolset: &str, headers: HeaderMap, body: String) -> Response {
    if toolbox.toolset(toolset).is_none() {
        let err = McpError::ToolsetNotFound(toolset.to_string());
        return (StatusCode::NOT_FOUND, Json(err.into_response(None))).into_response();
    }

    let claims = request_claims(&toolbox, &headers).await;
    let server = McpServer::new(toolbox).with_toolset(toolset);

    match server.handle_message(&body, &claims).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

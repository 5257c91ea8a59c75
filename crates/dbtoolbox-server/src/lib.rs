//! # dbtoolbox-server
//!
//! The HTTP server: the REST API under `/api`, MCP under `/mcp`, plus a
//! greeting at `/` and a health probe at `/health`.

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::{Json, Router, routing::get};
use dbtoolbox_runtime::Toolbox;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the full application router.
pub fn router(toolbox: Arc<Toolbox>) -> Router {
    let state = AppState::new(toolbox.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api::router())
        .with_state(state)
        .merge(dbtoolbox_mcp::create_router(toolbox))
        .layer(TraceLayer::new_for_http())
}

/// Bind, serve until `shutdown` resolves, then close every source.
pub async fn serve<F>(config: &ServerConfig, toolbox: Arc<Toolbox>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;

    tracing::info!(address = %addr, "Server ready to serve!");

    axum::serve(listener, router(toolbox.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped, closing sources");
    toolbox.close().await;
    Ok(())
}

async fn root() -> &'static str {
    "🧰 Hello, World! 🧰"
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dbtoolbox",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

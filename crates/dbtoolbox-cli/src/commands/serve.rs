//! `dbtoolbox serve`: load tools files, initialize every resource and serve
//! them over HTTP (REST + MCP) or MCP stdio.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dbtoolbox_core::ToolsFile;
use dbtoolbox_mcp::{McpServer, serve_stdio};
use dbtoolbox_runtime::Toolbox;
use dbtoolbox_server::ServerConfig;

/// Options for the serve command.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub tools_files: Vec<PathBuf>,
    pub address: String,
    pub port: u16,
    pub stdio: bool,
}

pub async fn serve(options: ServeOptions) -> anyhow::Result<()> {
    for path in &options.tools_files {
        tracing::info!(path = %path.display(), "Loading tools file");
    }
    let file = ToolsFile::load(&options.tools_files).context("unable to load tools files")?;

    tracing::info!(
        sources = file.sources.len(),
        auth_services = file.auth_services.len(),
        tools = file.tools.len(),
        toolsets = file.toolsets.len(),
        "Tools files loaded"
    );

    let toolbox = Arc::new(
        Toolbox::build(&file)
            .await
            .context("unable to initialize resources")?,
    );

    if options.stdio {
        return serve_stdio_until_shutdown(toolbox).await;
    }

    let config = ServerConfig {
        address: options.address,
        port: options.port,
    };
    dbtoolbox_server::serve(&config, toolbox, shutdown_signal()).await
}

async fn serve_stdio_until_shutdown(toolbox: Arc<Toolbox>) -> anyhow::Result<()> {
    let server = McpServer::new(toolbox.clone());
    tracing::info!("Server ready to serve!");

    let result = tokio::select! {
        result = serve_stdio(&server) => result.map_err(anyhow::Error::from),
        _ = shutdown_signal() => Ok(()),
    };

    toolbox.close().await;
    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal, stopping"),
        Err(e) => {
            tracing::error!(error = %e, "Unable to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}

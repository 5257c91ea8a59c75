//! Stdio transport: one JSON-RPC message per line on stdin, one response per
//! line on stdout. Logging must go to stderr while this runs.

use dbtoolbox_core::ClaimsMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::McpError;
use crate::server::McpServer;

/// Serve MCP over the process's stdin and stdout until stdin closes.
pub async fn serve_stdio(server: &McpServer) -> Result<(), McpError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run(server, stdin, stdout).await
}

/// Serve MCP over an arbitrary line-oriented stream pair.
///
/// There are no request headers on this transport, so no auth service
/// claims are ever available.
pub async fn run<R, W>(server: &McpServer, reader: R, mut writer: W) -> Result<(), McpError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("Starting MCP server with stdio transport");

    let claims = ClaimsMap::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = server.handle_message(line, &claims).await else {
            continue;
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    tracing::info!("stdin closed, stopping MCP stdio transport");
    Ok(())
}

//! # dbtoolbox-mcp
//!
//! MCP (Model Context Protocol) front end for dbtoolbox.
//!
//! Every configured tool is exposed to AI agents as an MCP tool whose input
//! schema is derived from its declared parameters. Two transports are
//! supported:
//!
//! - **stdio**: newline-delimited JSON-RPC on stdin/stdout
//! - **HTTP**: JSON-RPC POSTed to `/mcp` or `/mcp/{toolset}`
//!
//! ```text
//! AI Agent
//!     │  initialize / tools/list / tools/call
//!     ▼
//! ┌────────────────┐
//! │   McpServer    │  toolset scoping, protocol errors
//! └───────┬────────┘
//!         ▼
//!      Toolbox       authorization, parameters, execution
//! ```

pub mod error;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod stdio_transport;

pub use error::McpError;
pub use http_transport::{create_router, request_claims};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION,
    PROTOCOL_VERSIONS, ToolContent,
};
pub use server::McpServer;
pub use stdio_transport::serve_stdio;

//! Error types for the MCP crate.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR,
};

/// Protocol-level failures, each mapping to a JSON-RPC error code.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("tool with name \"{0}\" does not exist")]
    ToolNotFound(String),

    #[error("toolset with name \"{0}\" does not exist")]
    ToolsetNotFound(String),

    #[error("unauthorized tool call: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) | Self::Unauthorized(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::ToolNotFound(_) | Self::ToolsetNotFound(_) => {
                INVALID_PARAMS
            }
            Self::Internal(_) | Self::Io(_) => INTERNAL_ERROR,
        }
    }

    pub fn into_response(self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::error(id, self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let parse = serde_json::from_str::<Value>("{").unwrap_err();
        assert_eq!(McpError::from(parse).code(), -32700);
        assert_eq!(McpError::Unauthorized("t".into()).code(), -32600);
        assert_eq!(McpError::MethodNotFound("m".into()).code(), -32601);
        assert_eq!(McpError::ToolNotFound("t".into()).code(), -32602);
        assert_eq!(McpError::Internal("x".into()).code(), -32603);
    }
}

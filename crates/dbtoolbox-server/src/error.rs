use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dbtoolbox_runtime::ToolError;
use serde_json::json;

/// An error answered as `{"status": "...", "error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": self.status.canonical_reason().unwrap_or("Unknown"),
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

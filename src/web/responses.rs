use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Canonical JSON payload for error responses: `{"error": "..."}`.
#[derive(Debug, Serialize, Clone)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Error half of every JSON handler's result.
pub type JsonFailure = (StatusCode, Json<ApiError>);

/// Helper for controllers that need to return `(StatusCode, Json<ApiError>)`.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> JsonFailure {
    (status, Json(ApiError::new(message)))
}

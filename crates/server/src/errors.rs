use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::errors::ServiceError;
use thiserror::Error;
use tracing::error;

/// JSON error body: `{"error": <title>, "detail": <message>}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub detail: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: &'static str, detail: Option<String>) -> Self {
        Self { status, error, detail }
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = ?self.detail, "request failed");
        }
        (self.status, Json(serde_json::json!({"error": self.error, "detail": self.detail}))).into_response()
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        let (status, title) = match &e {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation Error"),
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::Duplicate(_) => (StatusCode::CONFLICT, "Duplicate"),
            ServiceError::NotAllowed(_) => (StatusCode::FORBIDDEN, "Not Allowed"),
            ServiceError::Internal(_) | ServiceError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        Self::new(status, title, Some(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("runtime check failed: {0}")]
    Runtime(String),
}

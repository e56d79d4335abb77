use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::upload_service::UploadError;

/// A lightweight wrapper that carries a status, a stable error code, and a
/// human-readable message to the HTTP layer.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code, and message.
    pub fn new(status: StatusCode, error_code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "error_code": self.error_code,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let (status, code) = match &err {
            UploadError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            UploadError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
            UploadError::MissingChunks(_) => (StatusCode::CONFLICT, "MISSING_CHUNKS"),
            UploadError::UnexpectedChunk(_) => (StatusCode::CONFLICT, "UNEXPECTED_CHUNK"),
            UploadError::StoreUnavailable(_) => (StatusCode::BAD_GATEWAY, "STORE_UNAVAILABLE"),
            UploadError::FinalizeInconsistency { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "FINALIZE_INCONSISTENCY")
            }
            UploadError::Unauthorized => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            UploadError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            UploadError::Metadata(_) => (StatusCode::INTERNAL_SERVER_ERROR, "METADATA_ERROR"),
        };
        AppError::new(status, code, err.to_string())
    }
}

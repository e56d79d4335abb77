//! HTTP handler for presigned download URLs.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{errors::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub download_url: String,
}

/// `GET /files/{session_id}/download`
///
/// The requester identity arrives in the `X-User-Id` header; issuing the
/// identity is the concern of an upstream gateway, not this service.
pub async fn get_download_url(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let requester = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "missing X-User-Id header",
            )
        })?;

    let download_url = state.downloads.download_url(session_id, requester).await?;
    Ok(Json(DownloadUrlResponse { download_url }))
}

//! HTTP handlers for the chunked upload lifecycle.
//! Streams chunk bodies to enforce the size cap without buffering more than
//! one request, and delegates all coordination to `UploadCoordinator`.

use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::BytesMut;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::AppError, models::session::UploadSession, state::AppState};

/// Request body for `POST /files/upload/initiate`.
#[derive(Debug, Deserialize)]
pub struct InitiateUploadRequest {
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub owner: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateUploadResponse {
    pub session_id: Uuid,
    pub upload_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
}

#[derive(Debug, Serialize)]
pub struct ChunkUploadResponse {
    pub session_id: Uuid,
    pub chunk_number: i64,
    pub integrity_token: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub session_id: Uuid,
    pub file_name: String,
    pub locator: String,
    pub file_size: i64,
    pub total_chunks: i64,
    pub status: String,
}

/// `POST /files/upload/initiate`
pub async fn initiate_upload(
    State(state): State<AppState>,
    Json(req): Json<InitiateUploadRequest>,
) -> Result<Json<InitiateUploadResponse>, AppError> {
    let session = state
        .uploads
        .initiate(&req.file_name, req.file_size, &req.content_type, &req.owner)
        .await?;

    Ok(Json(InitiateUploadResponse {
        session_id: session.id,
        upload_id: session.external_upload_id,
        file_name: session.file_name,
        file_size: session.declared_size,
        chunk_size: state.uploads.chunk_size(),
        total_chunks: session.total_chunks,
    }))
}

/// `PUT /files/upload/{session_id}/chunk/{chunk_number}` with a raw body.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path((session_id, chunk_number)): Path<(Uuid, i64)>,
    body: Body,
) -> Result<Json<ChunkUploadResponse>, AppError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(piece) = stream.next().await {
        let piece = piece.map_err(|err| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                "BODY_READ_ERROR",
                format!("failed to read chunk body: {err}"),
            )
        })?;
        if buf.len() + piece.len() > state.max_chunk_size {
            return Err(AppError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "CHUNK_TOO_LARGE",
                format!("chunk body exceeds {} bytes", state.max_chunk_size),
            ));
        }
        buf.extend_from_slice(&piece);
    }

    let record = state
        .uploads
        .add_chunk(session_id, chunk_number, buf.freeze())
        .await?;

    Ok(Json(ChunkUploadResponse {
        session_id,
        chunk_number: record.chunk_number,
        integrity_token: record.integrity_token,
        size_bytes: record.size_bytes,
    }))
}

/// `POST /files/upload/{session_id}/complete`
pub async fn complete_upload(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    let locator = state.uploads.complete(session_id).await?;
    let session = state.sessions.fetch_session(session_id).await?;

    Ok(Json(CompleteUploadResponse {
        session_id,
        file_name: session.file_name,
        locator,
        file_size: session.declared_size,
        total_chunks: session.total_chunks,
        status: session.status.to_string(),
    }))
}

/// `POST /files/upload/{session_id}/abort`
pub async fn abort_upload(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.uploads.abort(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /files/user/{owner}` — all of one owner's sessions, newest first.
pub async fn list_user_sessions(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<UploadSession>>, AppError> {
    Ok(Json(state.sessions.sessions_for_owner(&owner).await?))
}

//! Defines routes for the upload lifecycle and download endpoints.
//!
//! ## Structure
//! - **Upload lifecycle**
//!   - `POST /files/upload/initiate` — open a session
//!   - `PUT  /files/upload/{session_id}/chunk/{chunk_number}` — upload one chunk (raw body)
//!   - `POST /files/upload/{session_id}/complete` — assemble and finalize
//!   - `POST /files/upload/{session_id}/abort` — cancel
//!
//! - **Retrieval & listing**
//!   - `GET /files/{session_id}/download` — presigned URL (owner only)
//!   - `GET /files/user/{owner}` — one owner's sessions

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{
    handlers::{
        download_handlers::get_download_url,
        health_handlers::{healthz, readyz},
        upload_handlers::{
            abort_upload, complete_upload, initiate_upload, list_user_sessions, upload_chunk,
        },
    },
    state::AppState,
};

/// Build and return the router for all endpoints.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload lifecycle
        .route("/files/upload/initiate", post(initiate_upload))
        .route(
            "/files/upload/{session_id}/chunk/{chunk_number}",
            put(upload_chunk),
        )
        .route("/files/upload/{session_id}/complete", post(complete_upload))
        .route("/files/upload/{session_id}/abort", post(abort_upload))
        // retrieval & listing
        .route("/files/{session_id}/download", get(get_download_url))
        .route("/files/user/{owner}", get(list_user_sessions))
}

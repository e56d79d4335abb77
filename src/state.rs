//! Shared application state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::services::download_service::DownloadAuthorizer;
use crate::services::session_store::SessionStore;
use crate::services::upload_service::UploadCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadCoordinator>,
    pub downloads: Arc<DownloadAuthorizer>,
    pub sessions: SessionStore,

    /// Root of the on-disk object store, probed by the readiness check.
    pub storage_root: PathBuf,

    /// Upper bound on a single chunk request body.
    pub max_chunk_size: usize,
}

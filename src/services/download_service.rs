//! Download authorizer — verifies requester identity against the session
//! owner before issuing a presigned retrieval URL.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::services::object_store::ObjectStoreClient;
use crate::services::session_store::SessionStore;
use crate::services::upload_service::{UploadError, UploadResult};

pub struct DownloadAuthorizer {
    sessions: SessionStore,
    objects: Arc<dyn ObjectStoreClient>,
    presign_ttl: Duration,
}

impl DownloadAuthorizer {
    pub fn new(
        sessions: SessionStore,
        objects: Arc<dyn ObjectStoreClient>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            objects,
            presign_ttl,
        }
    }

    /// Issue a presigned download URL for the session's object.
    ///
    /// Owner comparison is an exact match; a mismatch is denied without
    /// revealing anything beyond what the caller already knows.
    pub async fn download_url(&self, session_id: Uuid, requester: &str) -> UploadResult<String> {
        let session = self.sessions.fetch_session(session_id).await?;

        if session.owner != requester {
            warn!(
                "access denied: user {} attempted to access session {} owned by {}",
                requester, session_id, session.owner
            );
            return Err(UploadError::Unauthorized);
        }

        self.objects
            .presign_get(&session.storage_key, self.presign_ttl)
            .await
            .map_err(|err| UploadError::StoreUnavailable(err.to_string()))
    }
}

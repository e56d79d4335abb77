pub mod mocks;

use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;

use upload_service::services::{
    download_service::DownloadAuthorizer, session_store::SessionStore,
    upload_service::UploadCoordinator,
};

use self::mocks::MockObjectStore;

/// 1 KiB chunks keep test payloads small while exercising real multi-chunk
/// sessions.
pub const TEST_CHUNK_SIZE: i64 = 1024;

#[allow(dead_code)]
pub struct TestHarness {
    pub uploads: UploadCoordinator,
    pub downloads: DownloadAuthorizer,
    pub sessions: SessionStore,
    pub store: Arc<MockObjectStore>,
}

/// Coordinator wired to an in-memory SQLite database and the recording mock
/// store. A single pooled connection keeps `sqlite::memory:` to one database.
pub async fn setup() -> TestHarness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect");

    let sessions = SessionStore::new(Arc::new(pool));
    sessions.migrate().await.expect("migrations apply");

    let store = MockObjectStore::new();
    let uploads = UploadCoordinator::new(
        sessions.clone(),
        store.clone(),
        TEST_CHUNK_SIZE,
        Duration::from_secs(5),
    );
    let downloads = DownloadAuthorizer::new(
        sessions.clone(),
        store.clone(),
        Duration::from_secs(600),
    );

    TestHarness {
        uploads,
        downloads,
        sessions,
        store,
    }
}

/// A chunk-sized payload filled with one repeated byte.
#[allow(dead_code)]
pub fn chunk_payload(fill: u8) -> bytes::Bytes {
    bytes::Bytes::from(vec![fill; TEST_CHUNK_SIZE as usize])
}

//! Download authorization: owner gets a presigned URL, anyone else is
//! denied before the store is ever consulted.

mod common;

use common::{TEST_CHUNK_SIZE, chunk_payload, setup};
use upload_service::services::upload_service::UploadError;

#[tokio::test]
async fn owner_receives_presigned_url() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", TEST_CHUNK_SIZE, "application/octet-stream", "owner")
        .await
        .unwrap();
    h.uploads.add_chunk(session.id, 1, chunk_payload(b'x')).await.unwrap();
    h.uploads.complete(session.id).await.unwrap();

    let url = h.downloads.download_url(session.id, "owner").await.unwrap();
    assert_eq!(url, format!("mock://{}?expires_in=600", session.storage_key));
    assert_eq!(h.store.presign_calls(), vec![session.storage_key.clone()]);
}

#[tokio::test]
async fn non_owner_is_denied_without_a_presign_call() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", TEST_CHUNK_SIZE, "application/octet-stream", "owner")
        .await
        .unwrap();

    let err = h
        .downloads
        .download_url(session.id, "attacker")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Unauthorized));
    assert!(h.store.presign_calls().is_empty());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = setup().await;
    let err = h
        .downloads
        .download_url(uuid::Uuid::new_v4(), "anyone")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::SessionNotFound(_)));
}

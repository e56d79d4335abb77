//! Exactly-once guarantees under at-least-once delivery: duplicate chunks,
//! repeated completion, concurrent submissions of the same chunk number.

mod common;

use bytes::Bytes;
use common::{TEST_CHUNK_SIZE, chunk_payload, setup};
use upload_service::models::session::UploadStatus;

#[tokio::test]
async fn duplicate_chunk_keeps_first_submission() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", 2 * TEST_CHUNK_SIZE, "application/octet-stream", "u1")
        .await
        .unwrap();

    let first = h
        .uploads
        .add_chunk(session.id, 1, Bytes::from(vec![b'a'; 1024]))
        .await
        .unwrap();
    // retry with a different payload must not create a second entry nor
    // re-upload anything
    let second = h
        .uploads
        .add_chunk(session.id, 1, Bytes::from(vec![b'z'; 1024]))
        .await
        .unwrap();

    assert_eq!(second.integrity_token, first.integrity_token);
    assert_eq!(second.id, first.id);
    assert_eq!(h.store.put_calls().len(), 1);

    let ledger = h.sessions.fetch_chunks(session.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].integrity_token, first.integrity_token);
}

#[tokio::test]
async fn complete_twice_returns_same_locator_without_second_store_call() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", TEST_CHUNK_SIZE, "application/octet-stream", "u1")
        .await
        .unwrap();
    h.uploads.add_chunk(session.id, 1, chunk_payload(b'x')).await.unwrap();

    let first = h.uploads.complete(session.id).await.unwrap();
    let second = h.uploads.complete(session.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.complete_calls().len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_chunks_yield_one_ledger_entry() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", 2 * TEST_CHUNK_SIZE, "application/octet-stream", "u1")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.uploads.add_chunk(session.id, 1, chunk_payload(b'a')),
        h.uploads.add_chunk(session.id, 1, chunk_payload(b'b')),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    // both callers observe the same recorded receipt
    assert_eq!(a.integrity_token, b.integrity_token);
    let ledger = h.sessions.fetch_chunks(session.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].integrity_token, a.integrity_token);
}

#[tokio::test]
async fn concurrent_first_chunks_activate_once() {
    let h = setup().await;
    let session = h
        .uploads
        .initiate("f.bin", 2 * TEST_CHUNK_SIZE, "application/octet-stream", "u1")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.uploads.add_chunk(session.id, 1, chunk_payload(b'a')),
        h.uploads.add_chunk(session.id, 2, chunk_payload(b'b')),
    );
    a.unwrap();
    b.unwrap();

    let reloaded = h.sessions.fetch_session(session.id).await.unwrap();
    assert_eq!(reloaded.status, UploadStatus::Active);
    assert_eq!(h.sessions.fetch_chunks(session.id).await.unwrap().len(), 2);
}

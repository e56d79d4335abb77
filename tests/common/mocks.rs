//! A recording object store used to drive the coordinator in tests.
//!
//! Every call is logged so tests can assert exactly what reached the store;
//! per-operation failure flags simulate an unavailable backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use uuid::Uuid;

use upload_service::services::object_store::{
    MultipartInit, ObjectStoreClient, ObjectStoreError, ObjectStoreResult, PartClaim,
};

#[derive(Default)]
struct MockState {
    begin_calls: u64,
    put_calls: Vec<(String, u32)>,
    complete_calls: Vec<(String, Vec<PartClaim>)>,
    abort_calls: Vec<String>,
    presign_calls: Vec<String>,

    fail_begin: bool,
    fail_put: bool,
    fail_complete: bool,
    fail_abort: bool,
    put_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockObjectStore {
    state: Mutex<MockState>,
    token_seq: AtomicU64,
}

#[allow(dead_code)]
impl MockObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_begin(&self, fail: bool) {
        self.state.lock().unwrap().fail_begin = fail;
    }

    pub fn set_fail_put(&self, fail: bool) {
        self.state.lock().unwrap().fail_put = fail;
    }

    pub fn set_fail_complete(&self, fail: bool) {
        self.state.lock().unwrap().fail_complete = fail;
    }

    pub fn set_fail_abort(&self, fail: bool) {
        self.state.lock().unwrap().fail_abort = fail;
    }

    pub fn set_put_delay(&self, delay: Duration) {
        self.state.lock().unwrap().put_delay = Some(delay);
    }

    pub fn begin_calls(&self) -> u64 {
        self.state.lock().unwrap().begin_calls
    }

    pub fn put_calls(&self) -> Vec<(String, u32)> {
        self.state.lock().unwrap().put_calls.clone()
    }

    pub fn complete_calls(&self) -> Vec<(String, Vec<PartClaim>)> {
        self.state.lock().unwrap().complete_calls.clone()
    }

    pub fn abort_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().abort_calls.clone()
    }

    pub fn presign_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().presign_calls.clone()
    }

    fn unavailable() -> ObjectStoreError {
        ObjectStoreError::Unavailable("injected failure".into())
    }
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    async fn begin_multipart(
        &self,
        file_name: &str,
        _content_type: &str,
    ) -> ObjectStoreResult<MultipartInit> {
        let mut state = self.state.lock().unwrap();
        if state.fail_begin {
            return Err(Self::unavailable());
        }
        state.begin_calls += 1;
        Ok(MultipartInit {
            upload_id: format!("upload-{}", Uuid::new_v4()),
            storage_key: format!("uploads/{}/{}", Uuid::new_v4(), file_name),
        })
    }

    async fn put_part(
        &self,
        upload_id: &str,
        _storage_key: &str,
        part_number: u32,
        _bytes: Bytes,
    ) -> ObjectStoreResult<String> {
        let delay = {
            let state = self.state.lock().unwrap();
            if state.fail_put {
                return Err(Self::unavailable());
            }
            state.put_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let seq = self.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .lock()
            .unwrap()
            .put_calls
            .push((upload_id.to_string(), part_number));
        // Tokens are unique per acknowledged upload so tests can tell a
        // first submission's receipt apart from any later one.
        Ok(format!("t{part_number}#{seq}"))
    }

    async fn complete_multipart(
        &self,
        upload_id: &str,
        storage_key: &str,
        parts: &[PartClaim],
    ) -> ObjectStoreResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_complete {
            return Err(Self::unavailable());
        }
        state
            .complete_calls
            .push((upload_id.to_string(), parts.to_vec()));
        Ok(format!("mock://{storage_key}"))
    }

    async fn abort_multipart(&self, upload_id: &str, _storage_key: &str) -> ObjectStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_abort {
            return Err(Self::unavailable());
        }
        state.abort_calls.push(upload_id.to_string());
        Ok(())
    }

    async fn presign_get(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        let mut state = self.state.lock().unwrap();
        state.presign_calls.push(storage_key.to_string());
        Ok(format!("mock://{storage_key}?expires_in={}", ttl.as_secs()))
    }
}

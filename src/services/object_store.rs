//! Object store client seam.
//!
//! `ObjectStoreClient` is the capability-typed interface the coordinator
//! depends on: initiate / put-part / complete / abort / presign, each able
//! to fail with a generic "store unavailable" condition that callers treat
//! as retryable. `FsObjectStore` is a local-disk backend implementing the
//! same contract: parts are staged under `.parts/{upload_id}` and assembled
//! into `base_path/{storage_key}` on completion.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Handles issued by the store at initiation. Both are opaque to the
/// coordinator and required verbatim for every subsequent call.
#[derive(Debug, Clone)]
pub struct MultipartInit {
    pub upload_id: String,
    pub storage_key: String,
}

/// One `(part_number, integrity_token)` pair presented at completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartClaim {
    pub part_number: u32,
    pub integrity_token: String,
}

/// Capability-typed client for a multipart-capable object store.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Open a multipart upload, returning the transient upload id and the
    /// object key the assembled file will live under.
    async fn begin_multipart(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> ObjectStoreResult<MultipartInit>;

    /// Upload one part, returning its opaque integrity token.
    async fn put_part(
        &self,
        upload_id: &str,
        storage_key: &str,
        part_number: u32,
        bytes: Bytes,
    ) -> ObjectStoreResult<String>;

    /// Assemble the parts into the final object and return its locator.
    /// Not safe to call twice against the same upload id.
    async fn complete_multipart(
        &self,
        upload_id: &str,
        storage_key: &str,
        parts: &[PartClaim],
    ) -> ObjectStoreResult<String>;

    /// Discard an in-progress upload and its staged parts.
    async fn abort_multipart(&self, upload_id: &str, storage_key: &str) -> ObjectStoreResult<()>;

    /// Produce a time-limited retrieval URL for an assembled object.
    async fn presign_get(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String>;
}

/// Local-disk object store.
///
/// Layout beneath `base_path`:
/// - staged parts: `.parts/{upload_id}/{part_number:05}`
/// - assembled objects: `{storage_key}` (keys look like `uploads/{uuid}/{file_name}`)
///
/// Integrity tokens are the md5 hex digest of the part payload; completion
/// re-derives each digest from disk and refuses mismatched claims.
#[derive(Clone)]
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Keys are generated internally, but never let a stored key escape the
    /// base directory.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::Unavailable(format!(
                "refusing unsafe storage key `{key}`"
            )));
        }
        Ok(())
    }

    fn parts_dir(&self, upload_id: &str) -> PathBuf {
        self.base_path.join(".parts").join(upload_id)
    }

    fn part_path(&self, upload_id: &str, part_number: u32) -> PathBuf {
        self.parts_dir(upload_id).join(format!("{part_number:05}"))
    }

    fn object_path(&self, storage_key: &str) -> PathBuf {
        self.base_path.join(storage_key)
    }

    /// Write bytes to a temp file, fsync, and atomically rename into place.
    async fn write_atomic(dest: &PathBuf, bytes: &[u8]) -> ObjectStoreResult<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| {
                io::Error::new(ErrorKind::Other, "destination path missing parent directory")
            })?
            .to_path_buf();
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp_path, dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for FsObjectStore {
    async fn begin_multipart(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> ObjectStoreResult<MultipartInit> {
        let upload_id = Uuid::new_v4().to_string();
        let storage_key = format!("uploads/{}/{}", Uuid::new_v4(), file_name);
        Self::ensure_key_safe(&storage_key)?;

        fs::create_dir_all(self.parts_dir(&upload_id)).await?;
        debug!(
            "opened multipart upload {} for `{}` ({})",
            upload_id, file_name, content_type
        );

        Ok(MultipartInit {
            upload_id,
            storage_key,
        })
    }

    async fn put_part(
        &self,
        upload_id: &str,
        _storage_key: &str,
        part_number: u32,
        bytes: Bytes,
    ) -> ObjectStoreResult<String> {
        let parts_dir = self.parts_dir(upload_id);
        match fs::metadata(&parts_dir).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::Unavailable(format!(
                    "unknown upload id `{upload_id}`"
                )));
            }
            Err(err) => return Err(err.into()),
        }

        let token = format!("{:x}", md5::compute(&bytes));
        Self::write_atomic(&self.part_path(upload_id, part_number), &bytes).await?;
        debug!(
            "stored part {} of upload {} ({} bytes)",
            part_number,
            upload_id,
            bytes.len()
        );
        Ok(token)
    }

    async fn complete_multipart(
        &self,
        upload_id: &str,
        storage_key: &str,
        parts: &[PartClaim],
    ) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(storage_key)?;
        let parts_dir = self.parts_dir(upload_id);
        if fs::metadata(&parts_dir).await.is_err() {
            return Err(ObjectStoreError::Unavailable(format!(
                "unknown or already finalized upload id `{upload_id}`"
            )));
        }

        let mut assembled = Vec::new();
        for claim in parts {
            let path = self.part_path(upload_id, claim.part_number);
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(ObjectStoreError::Unavailable(format!(
                        "part {} of upload `{upload_id}` was never stored",
                        claim.part_number
                    )));
                }
                Err(err) => return Err(err.into()),
            };
            let digest = format!("{:x}", md5::compute(&data));
            if digest != claim.integrity_token {
                return Err(ObjectStoreError::Unavailable(format!(
                    "integrity token mismatch for part {} of upload `{upload_id}`",
                    claim.part_number
                )));
            }
            assembled.extend_from_slice(&data);
        }

        Self::write_atomic(&self.object_path(storage_key), &assembled).await?;
        fs::remove_dir_all(&parts_dir).await?;

        let locator = format!("file://{storage_key}");
        debug!(
            "assembled {} parts of upload {} into {}",
            parts.len(),
            upload_id,
            locator
        );
        Ok(locator)
    }

    async fn abort_multipart(&self, upload_id: &str, _storage_key: &str) -> ObjectStoreResult<()> {
        match fs::remove_dir_all(self.parts_dir(upload_id)).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("parts of upload {} already gone", upload_id);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    async fn presign_get(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(storage_key)?;
        match fs::metadata(self.object_path(storage_key)).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::Unavailable(format!(
                    "no assembled object at `{storage_key}`"
                )));
            }
            Err(err) => return Err(err.into()),
        }

        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let digest = md5::compute(format!("{storage_key}:{expires}"));
        let sig = general_purpose::URL_SAFE_NO_PAD.encode(digest.0);
        Ok(format!("file://{storage_key}?expires={expires}&sig={sig}"))
    }
}

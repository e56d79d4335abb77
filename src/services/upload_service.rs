//! Upload coordinator — orchestrates the three-step chunked upload protocol
//! (initiate / add-chunk / complete) across the object store and the session
//! store, translating failures from both into one error taxonomy.
//!
//! Ordering rules:
//! - `initiate` talks to the object store first; no session row is written
//!   if the store call fails, so there is never orphaned metadata.
//! - `add_chunk` uploads bytes first, then records the ledger entry; a store
//!   failure leaves the ledger untouched.
//! - `complete` treats the store call as the durability boundary: before it,
//!   every failure leaves the session ACTIVE and retryable; after it, a
//!   metadata failure is surfaced as `FinalizeInconsistency` and the
//!   persisted locator lets a retry reconcile metadata without a second
//!   store call.

use bytes::Bytes;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    chunk::ChunkRecord,
    session::{UploadSession, UploadStatus},
};
use crate::services::lifecycle::{self, IllegalTransition};
use crate::services::object_store::{ObjectStoreClient, ObjectStoreResult, PartClaim};
use crate::services::session_store::{NewSession, RecordOutcome, SessionStore};

#[derive(Debug, Error)]
pub enum UploadError {
    /// The object store rejected or timed out on a call. Transient: the
    /// caller may retry the whole operation; nothing was recorded.
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("upload session `{0}` not found")]
    SessionNotFound(Uuid),

    #[error("invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        current: UploadStatus,
        requested: UploadStatus,
    },

    /// Completion-time validation: these chunk numbers were never recorded.
    #[error("cannot complete upload, missing chunks {0:?}")]
    MissingChunks(Vec<i64>),

    /// A recorded or submitted chunk number lies outside `1..=total_chunks`.
    #[error("chunk number {0} is outside the expected range")]
    UnexpectedChunk(i64),

    /// The object store finalized the upload but session metadata could not
    /// be updated to match. Fatal until reconciled; the locator names the
    /// assembled object.
    #[error("store finalized upload at `{locator}` but metadata was not updated: {source}")]
    FinalizeInconsistency {
        locator: String,
        #[source]
        source: Box<UploadError>,
    },

    #[error("requester is not the owner of this upload")]
    Unauthorized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metadata store error: {0}")]
    Metadata(#[from] sqlx::Error),
}

impl From<IllegalTransition> for UploadError {
    fn from(t: IllegalTransition) -> Self {
        Self::InvalidStateTransition {
            current: t.current,
            requested: t.requested,
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

pub struct UploadCoordinator {
    sessions: SessionStore,
    objects: Arc<dyn ObjectStoreClient>,
    chunk_size: i64,
    store_timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(
        sessions: SessionStore,
        objects: Arc<dyn ObjectStoreClient>,
        chunk_size: i64,
        store_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            objects,
            chunk_size,
            store_timeout,
        }
    }

    /// Run one object-store call under the configured timeout. The timeout
    /// wraps the store future only, so expiry can never land between a
    /// successful store call and its metadata write.
    async fn store_call<T>(
        &self,
        fut: impl Future<Output = ObjectStoreResult<T>>,
    ) -> UploadResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(UploadError::StoreUnavailable(err.to_string())),
            Err(_) => Err(UploadError::StoreUnavailable(format!(
                "call timed out after {:?}",
                self.store_timeout
            ))),
        }
    }

    /// Open a new upload session.
    ///
    /// The object store is contacted first; if it fails nothing is
    /// persisted. On success a PENDING session is stored carrying the
    /// store's opaque handles.
    pub async fn initiate(
        &self,
        file_name: &str,
        declared_size: i64,
        content_type: &str,
        owner: &str,
    ) -> UploadResult<UploadSession> {
        if file_name.is_empty() {
            return Err(UploadError::InvalidRequest("file name must not be empty".into()));
        }
        if content_type.is_empty() {
            return Err(UploadError::InvalidRequest("content type must not be empty".into()));
        }
        if owner.is_empty() {
            return Err(UploadError::InvalidRequest("owner must not be empty".into()));
        }
        if declared_size <= 0 {
            return Err(UploadError::InvalidRequest("file size must be positive".into()));
        }

        info!("initiating upload for file `{}`", file_name);
        let init = self
            .store_call(self.objects.begin_multipart(file_name, content_type))
            .await?;

        let total_chunks = (declared_size + self.chunk_size - 1) / self.chunk_size;
        let session = self
            .sessions
            .insert_session(NewSession {
                file_name: file_name.to_string(),
                content_type: content_type.to_string(),
                declared_size,
                owner: owner.to_string(),
                external_upload_id: init.upload_id,
                storage_key: init.storage_key,
                total_chunks,
            })
            .await?;

        info!(
            "upload initiated: session {}, upload id {}, {} chunks",
            session.id, session.external_upload_id, session.total_chunks
        );
        Ok(session)
    }

    /// The configured chunk size, echoed to clients at initiation.
    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    /// Upload one chunk and record it in the ledger.
    ///
    /// Duplicate submissions of a `(session, chunk_number)` pair return the
    /// originally recorded entry without contacting the object store again;
    /// the ledger keeps the first successful submission.
    pub async fn add_chunk(
        &self,
        session_id: Uuid,
        chunk_number: i64,
        bytes: Bytes,
    ) -> UploadResult<ChunkRecord> {
        if chunk_number < 1 {
            return Err(UploadError::InvalidRequest("chunk number must be at least 1".into()));
        }

        let session = self.sessions.fetch_session(session_id).await?;
        if chunk_number > session.total_chunks {
            return Err(UploadError::UnexpectedChunk(chunk_number));
        }
        lifecycle::ensure_transition(session.status, UploadStatus::Active)?;

        if let Some(existing) = self.sessions.fetch_chunk(session_id, chunk_number).await? {
            debug!(
                "chunk {} of session {} already recorded, skipping store upload",
                chunk_number, session_id
            );
            return Ok(existing);
        }

        let size_bytes = bytes.len() as i64;
        let token = self
            .store_call(self.objects.put_part(
                &session.external_upload_id,
                &session.storage_key,
                chunk_number as u32,
                bytes,
            ))
            .await
            .inspect_err(|err| {
                error!(
                    "part upload failed for session {}, chunk {}: {}",
                    session_id, chunk_number, err
                );
            })?;

        match self
            .sessions
            .record_chunk(session_id, chunk_number, &token, size_bytes)
            .await?
        {
            RecordOutcome::Recorded(record) => Ok(record),
            RecordOutcome::Duplicate(existing) => {
                debug!(
                    "concurrent submission won chunk {} of session {}",
                    chunk_number, session_id
                );
                Ok(existing)
            }
        }
    }

    /// Finalize the upload, assembling all chunks into the final object.
    ///
    /// Idempotent: a COMPLETED session returns its stored locator with no
    /// store call. A session whose locator is set but whose status never
    /// reached COMPLETED is reconciled metadata-only — the store already
    /// finalized on a previous attempt and must not be asked to do so again.
    pub async fn complete(&self, session_id: Uuid) -> UploadResult<String> {
        let session = self.sessions.fetch_session(session_id).await?;

        if session.status == UploadStatus::Completed {
            info!("session {} already completed, returning stored locator", session_id);
            return session
                .locator
                .ok_or(UploadError::Metadata(sqlx::Error::RowNotFound));
        }

        if let Some(locator) = session.locator.clone() {
            info!(
                "session {} holds a locator but is not COMPLETED; reconciling metadata only",
                session_id
            );
            self.sessions.finalize_completed(session_id, &locator).await?;
            return Ok(locator);
        }

        lifecycle::ensure_transition(session.status, UploadStatus::Completed)?;

        let chunks = self.sessions.fetch_chunks(session_id).await?;
        let present: BTreeSet<i64> = chunks.iter().map(|c| c.chunk_number).collect();
        if let Some(&stray) = present
            .iter()
            .find(|&&n| n < 1 || n > session.total_chunks)
        {
            return Err(UploadError::UnexpectedChunk(stray));
        }
        let missing: Vec<i64> = (1..=session.total_chunks)
            .filter(|n| !present.contains(n))
            .collect();
        if !missing.is_empty() {
            return Err(UploadError::MissingChunks(missing));
        }

        // fetch_chunks orders ascending, which the store requires.
        let claims: Vec<PartClaim> = chunks
            .iter()
            .map(|c| PartClaim {
                part_number: c.chunk_number as u32,
                integrity_token: c.integrity_token.clone(),
            })
            .collect();

        info!("completing upload for session {}", session_id);
        let locator = self
            .store_call(self.objects.complete_multipart(
                &session.external_upload_id,
                &session.storage_key,
                &claims,
            ))
            .await
            .inspect_err(|err| {
                // Session stays ACTIVE; the caller may retry the whole call.
                error!("store completion failed for session {}: {}", session_id, err);
            })?;

        // The store has finalized. From here on a metadata failure leaves
        // the two systems out of step and must be reported as such.
        if let Err(err) = self.sessions.set_locator(session_id, &locator).await {
            error!(
                "session {} finalized in store at {} but locator write failed: {}",
                session_id, locator, err
            );
            return Err(UploadError::FinalizeInconsistency {
                locator,
                source: Box::new(err),
            });
        }
        match self.sessions.finalize_completed(session_id, &locator).await {
            Ok(_) => {
                info!("session {} completed at {}", session_id, locator);
                Ok(locator)
            }
            Err(err) => {
                error!(
                    "session {} finalized in store at {} but status write failed: {}",
                    session_id, locator, err
                );
                Err(UploadError::FinalizeInconsistency {
                    locator,
                    source: Box::new(err),
                })
            }
        }
    }

    /// Cancel an upload. The store-side abort is best-effort: it is itself a
    /// cleanup action, so its failure is logged rather than propagated.
    pub async fn abort(&self, session_id: Uuid) -> UploadResult<UploadSession> {
        let session = self.sessions.fetch_session(session_id).await?;
        lifecycle::ensure_transition(session.status, UploadStatus::Aborted)?;

        if let Err(err) = self
            .store_call(
                self.objects
                    .abort_multipart(&session.external_upload_id, &session.storage_key),
            )
            .await
        {
            warn!("store abort failed for session {}: {}", session_id, err);
        }

        let session = self
            .sessions
            .update_status(session_id, UploadStatus::Aborted)
            .await?;
        info!("session {} aborted", session_id);
        Ok(session)
    }

    /// Mark an upload as failed. Legal from ACTIVE only; no store call.
    pub async fn mark_failed(&self, session_id: Uuid) -> UploadResult<UploadSession> {
        let session = self
            .sessions
            .update_status(session_id, UploadStatus::Failed)
            .await?;
        warn!("session {} marked failed", session_id);
        Ok(session)
    }
}

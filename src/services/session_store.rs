//! Session store — SQLite-backed system of record for upload sessions and
//! their chunk ledgers.
//!
//! The schema enforces `UNIQUE (session_id, chunk_number)`; that constraint,
//! not a pre-check, is what makes duplicate chunk submissions idempotent.
//! The chunk insert and the PENDING→ACTIVE flip happen inside one
//! transaction so the state check and the insert are evaluated against the
//! same snapshot.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    chunk::ChunkRecord,
    session::{UploadSession, UploadStatus},
};
use crate::services::lifecycle;
use crate::services::upload_service::{UploadError, UploadResult};

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const SESSION_COLUMNS: &str = "id, file_name, content_type, declared_size, owner, \
     external_upload_id, storage_key, total_chunks, status, locator, created_at, updated_at";

const CHUNK_COLUMNS: &str =
    "id, session_id, chunk_number, integrity_token, size_bytes, recorded_at";

/// Fields supplied when persisting a freshly initiated session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub file_name: String,
    pub content_type: String,
    pub declared_size: i64,
    pub owner: String,
    pub external_upload_id: String,
    pub storage_key: String,
    pub total_chunks: i64,
}

/// Outcome of recording a chunk: either a fresh ledger entry or the row a
/// previous (possibly concurrent) submission already won.
#[derive(Debug)]
pub enum RecordOutcome {
    Recorded(ChunkRecord),
    Duplicate(ChunkRecord),
}

#[derive(Clone)]
pub struct SessionStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,
}

impl SessionStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema, statement by statement.
    pub async fn migrate(&self) -> UploadResult<()> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        debug!("running {} migration statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Persist a new PENDING session and return it with its assigned id.
    pub async fn insert_session(&self, new: NewSession) -> UploadResult<UploadSession> {
        let now = Utc::now();
        let session = UploadSession {
            id: Uuid::new_v4(),
            file_name: new.file_name,
            content_type: new.content_type,
            declared_size: new.declared_size,
            owner: new.owner,
            external_upload_id: new.external_upload_id,
            storage_key: new.storage_key,
            total_chunks: new.total_chunks,
            status: UploadStatus::Pending,
            locator: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO upload_sessions (id, file_name, content_type, declared_size, owner,
                 external_upload_id, storage_key, total_chunks, status, locator,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id)
        .bind(&session.file_name)
        .bind(&session.content_type)
        .bind(session.declared_size)
        .bind(&session.owner)
        .bind(&session.external_upload_id)
        .bind(&session.storage_key)
        .bind(session.total_chunks)
        .bind(session.status)
        .bind(&session.locator)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&*self.db)
        .await?;

        Ok(session)
    }

    /// Load a session by id.
    pub async fn fetch_session(&self, session_id: Uuid) -> UploadResult<UploadSession> {
        sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::SessionNotFound(session_id),
            other => UploadError::Metadata(other),
        })
    }

    /// All sessions belonging to one owner, newest first.
    pub async fn sessions_for_owner(&self, owner: &str) -> UploadResult<Vec<UploadSession>> {
        Ok(sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions
             WHERE owner = ? ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(&*self.db)
        .await?)
    }

    /// The session's ledger, ordered by chunk number.
    pub async fn fetch_chunks(&self, session_id: Uuid) -> UploadResult<Vec<ChunkRecord>> {
        Ok(sqlx::query_as::<_, ChunkRecord>(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunk_records
             WHERE session_id = ? ORDER BY chunk_number ASC"
        ))
        .bind(session_id)
        .fetch_all(&*self.db)
        .await?)
    }

    /// Look up one ledger entry.
    pub async fn fetch_chunk(
        &self,
        session_id: Uuid,
        chunk_number: i64,
    ) -> UploadResult<Option<ChunkRecord>> {
        Ok(sqlx::query_as::<_, ChunkRecord>(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunk_records
             WHERE session_id = ? AND chunk_number = ?"
        ))
        .bind(session_id)
        .bind(chunk_number)
        .fetch_optional(&*self.db)
        .await?)
    }

    /// Insert a ledger entry and, when it is the session's first chunk, flip
    /// PENDING→ACTIVE — one transaction, one snapshot.
    ///
    /// A unique-constraint violation means a concurrent submission of the
    /// same chunk number won the race; the transaction rolls back and the
    /// winner's row is returned unchanged.
    pub async fn record_chunk(
        &self,
        session_id: Uuid,
        chunk_number: i64,
        integrity_token: &str,
        size_bytes: i64,
    ) -> UploadResult<RecordOutcome> {
        let mut tx = self.db.begin().await?;

        let session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::SessionNotFound(session_id),
            other => UploadError::Metadata(other),
        })?;

        lifecycle::ensure_transition(session.status, UploadStatus::Active)?;

        let record = ChunkRecord {
            id: Uuid::new_v4(),
            session_id,
            chunk_number,
            integrity_token: integrity_token.to_string(),
            size_bytes,
            recorded_at: Utc::now(),
        };

        let inserted = sqlx::query(
            "INSERT INTO chunk_records (id, session_id, chunk_number, integrity_token,
                 size_bytes, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.session_id)
        .bind(record.chunk_number)
        .bind(&record.integrity_token)
        .bind(record.size_bytes)
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                drop(tx);
                debug!(
                    "chunk {} of session {} already recorded, returning existing entry",
                    chunk_number, session_id
                );
                let existing = self
                    .fetch_chunk(session_id, chunk_number)
                    .await?
                    .ok_or(UploadError::Metadata(sqlx::Error::RowNotFound))?;
                return Ok(RecordOutcome::Duplicate(existing));
            }
            Err(err) => return Err(err.into()),
        }

        if session.status == UploadStatus::Pending {
            sqlx::query("UPDATE upload_sessions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(UploadStatus::Active)
                .bind(Utc::now())
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(RecordOutcome::Recorded(record))
    }

    /// State-machine-checked status change, read and written in one
    /// transaction so racing mutations serialize cleanly.
    pub async fn update_status(
        &self,
        session_id: Uuid,
        requested: UploadStatus,
    ) -> UploadResult<UploadSession> {
        let mut tx = self.db.begin().await?;

        let mut session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::SessionNotFound(session_id),
            other => UploadError::Metadata(other),
        })?;

        lifecycle::ensure_transition(session.status, requested)?;

        session.status = requested;
        session.updated_at = Utc::now();
        sqlx::query("UPDATE upload_sessions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(session.status)
            .bind(session.updated_at)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    /// Persist the store locator on its own. This is the durable marker that
    /// the object store finalized the upload, written before the status flip
    /// so an interrupted completion can be reconciled without a second store
    /// call.
    pub async fn set_locator(&self, session_id: Uuid, locator: &str) -> UploadResult<()> {
        let result =
            sqlx::query("UPDATE upload_sessions SET locator = ?, updated_at = ? WHERE id = ?")
                .bind(locator)
                .bind(Utc::now())
                .bind(session_id)
                .execute(&*self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(UploadError::SessionNotFound(session_id));
        }
        Ok(())
    }

    /// Move a session to COMPLETED, storing the locator. Idempotent for
    /// sessions that are already COMPLETED.
    pub async fn finalize_completed(
        &self,
        session_id: Uuid,
        locator: &str,
    ) -> UploadResult<UploadSession> {
        let mut tx = self.db.begin().await?;

        let mut session = sqlx::query_as::<_, UploadSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM upload_sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::SessionNotFound(session_id),
            other => UploadError::Metadata(other),
        })?;

        if session.status == UploadStatus::Completed {
            return Ok(session);
        }
        lifecycle::ensure_transition(session.status, UploadStatus::Completed)?;

        session.status = UploadStatus::Completed;
        session.locator = Some(locator.to_string());
        session.updated_at = Utc::now();
        sqlx::query(
            "UPDATE upload_sessions SET status = ?, locator = ?, updated_at = ? WHERE id = ?",
        )
        .bind(session.status)
        .bind(&session.locator)
        .bind(session.updated_at)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

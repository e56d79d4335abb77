//! Represents one logical chunked-upload attempt for one file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of an upload session.
///
/// COMPLETED, FAILED, and ABORTED are terminal; see `services::lifecycle`
/// for the allowed transitions.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStatus {
    /// Session initiated, awaiting the first chunk.
    Pending,

    /// At least one chunk recorded.
    Active,

    /// All chunks uploaded and assembled in the object store.
    Completed,

    /// Upload failed and will not make further progress.
    Failed,

    /// Upload cancelled by the client or an operator.
    Aborted,
}

impl UploadStatus {
    /// True for states that admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// A chunked upload session.
///
/// One row per logical file upload. The session carries the opaque handles
/// issued by the object store at initiation; both are required verbatim for
/// every subsequent store call.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadSession {
    /// Unique identifier assigned by the session store on creation.
    pub id: Uuid,

    /// Original file name supplied at initiation.
    pub file_name: String,

    /// Content type (MIME type) supplied at initiation.
    pub content_type: String,

    /// Declared total file size in bytes.
    pub declared_size: i64,

    /// Identity of the uploading user.
    pub owner: String,

    /// Opaque multipart upload id issued by the object store.
    pub external_upload_id: String,

    /// Opaque object key issued by the object store.
    pub storage_key: String,

    /// Number of chunks this upload is divided into
    /// (`ceil(declared_size / chunk_size)`, fixed at initiation).
    pub total_chunks: i64,

    /// Current lifecycle state.
    pub status: UploadStatus,

    /// Locator of the assembled object. Set once the object store has
    /// finalized the upload; doubles as the durable marker that the store
    /// side of completion already happened.
    pub locator: Option<String>,

    /// When this session was created.
    pub created_at: DateTime<Utc>,

    /// When this session was last modified.
    pub updated_at: DateTime<Utc>,
}

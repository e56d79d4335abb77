//! Represents one recorded chunk of an upload session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One chunk successfully acknowledged by the object store.
///
/// Records are created by `add_chunk` only and never mutated. The schema
/// enforces `UNIQUE (session_id, chunk_number)`, so a duplicate submission
/// can never produce a second row.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ChunkRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Owning session.
    pub session_id: Uuid,

    /// Chunk number (1-based).
    pub chunk_number: i64,

    /// Opaque per-part acknowledgment returned by the object store,
    /// required verbatim at completion.
    pub integrity_token: String,

    /// Size of the chunk in bytes.
    pub size_bytes: i64,

    /// Timestamp when this chunk was recorded.
    pub recorded_at: DateTime<Utc>,
}

//! Core data models for the chunked upload coordination service.
//!
//! These entities represent upload sessions and their chunk ledgers.
//! They map cleanly to database tables via `sqlx::FromRow` and serialize
//! naturally as JSON via `serde`.

pub mod chunk;
pub mod session;

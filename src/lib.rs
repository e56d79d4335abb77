//! Chunked file upload coordination service.
//!
//! Clients upload large files in independently-transmitted chunks; this
//! crate keeps the object-storage backend and the session metadata store
//! consistent through the initiate → add-chunk → complete lifecycle, with
//! idempotent semantics at every step.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

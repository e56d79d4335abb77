//! Service layer: the upload coordinator and its collaborators.

pub mod download_service;
pub mod lifecycle;
pub mod object_store;
pub mod session_store;
pub mod upload_service;

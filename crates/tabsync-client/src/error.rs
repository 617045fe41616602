//! Error types for the client layer.
//!
//! The merge/resolve/apply core is total and infallible; everything
//! that can fail lives at the orchestrator's I/O boundary.

use crate::storage::PersistenceError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can end a sync cycle early. Because merge, resolve and
/// apply are idempotent, retrying a failed cycle from scratch is always
/// safe.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

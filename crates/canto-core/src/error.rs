//! Engine error types
//!
//! All fallible engine operations return [`EngineError`]. Validation happens
//! before any state mutation; storage failures surface after a single retry.

use crate::storage::StoreError;

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Input rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),
    /// Unknown session, learner, or item
    #[error("Not found: {0}")]
    NotFound(String),
    /// Operation targets a session that is not in the Active state
    #[error("Session not active: {0}")]
    SessionNotActive(String),
    /// Concurrent write contention on a (learner, item) key
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The review state store failed a read/write
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

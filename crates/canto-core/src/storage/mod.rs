//! Storage module - the Review State Store contract
//!
//! The engine never talks to a database directly; everything goes through
//! the [`ReviewStore`] trait so the surrounding application can inject its
//! own persistence. [`SqliteStore`] is the reference implementation.

mod migrations;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::review::{ReviewState, StudyResult, StudySession};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Store result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// REVIEW STORE CONTRACT
// ============================================================================

/// Durable keyed storage of per-(learner, item) scheduling state plus the
/// session/result history the stats aggregator reads.
///
/// Implementations must make `upsert_review_state` atomic per
/// (learner, item) key; the engine performs its read-modify-write through
/// that single call and serializes nothing else.
pub trait ReviewStore: Send + Sync {
    /// Fetch the scheduling state for one (learner, item) pair, if any
    fn get_review_state(
        &self,
        learner_id: &str,
        item_id: &str,
    ) -> StoreResult<Option<ReviewState>>;

    /// Insert or replace the scheduling state for its (learner, item) key.
    /// Must be atomic per key.
    fn upsert_review_state(&self, state: &ReviewState) -> StoreResult<()>;

    /// Items with `next_due_at <= now` for this learner, ascending by
    /// `next_due_at` (most overdue first), truncated to `limit`
    fn get_due_items(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ReviewState>>;

    /// Items with no review state for this learner, ordered by the item's
    /// canonical position, truncated to `limit`
    fn get_unseen_items(&self, learner_id: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Append one immutable study result to the history
    fn append_study_result(&self, result: &StudyResult) -> StoreResult<()>;

    /// Persist a newly started session
    fn create_session(&self, session: &StudySession) -> StoreResult<()>;

    /// Fetch a session by id
    fn get_session(&self, session_id: &str) -> StoreResult<Option<StudySession>>;

    /// Write the end-of-session summary (single finalization write)
    fn finalize_session(&self, session: &StudySession) -> StoreResult<()>;

    /// All results recorded in one session, in recording order
    fn results_for_session(&self, session_id: &str) -> StoreResult<Vec<StudyResult>>;

    /// Completed sessions for a learner, optionally bounded by end time
    fn completed_sessions(
        &self,
        learner_id: &str,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudySession>>;

    /// All results for a learner, optionally bounded by recording time
    fn results_for_learner(
        &self,
        learner_id: &str,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudyResult>>;

    /// All review states for a learner
    fn review_states_for_learner(&self, learner_id: &str) -> StoreResult<Vec<ReviewState>>;
}

//! Review module - Core types and data structures
//!
//! Implements the scheduling data model:
//! - Per-(learner, item) review state with SM-2 parameters
//! - Study sessions and append-only study results
//! - Mastery classification

mod state;

pub use state::{
    Mastery, ReviewState, SessionType, StudyResult, StudySession, INITIAL_EASE_FACTOR,
    MIN_EASE_FACTOR,
};

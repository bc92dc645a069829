//! # Canto Core
//!
//! Spaced-repetition scheduling engine for literary memorization. Decides,
//! per learner and per memorization item, when that item should next be
//! reviewed, and adapts scheduling to observed recall performance.
//!
//! - **SM-2 scheduler**: pure, deterministic interval/ease computation
//! - **Queue builder**: due and unseen item selection per session type
//! - **Session manager**: Created → Active → Completed lifecycle with an
//!   append-only result history
//! - **Stats aggregator**: streaks, success rates, per-item difficulty,
//!   mastery classification
//!
//! Persistence goes through the injected [`ReviewStore`] contract;
//! [`SqliteStore`] is the bundled reference implementation. Content
//! authoring, rendering, and authentication live outside this crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use canto_core::{Engine, SessionOptions, SessionType, SqliteStore, StatsWindow};
//!
//! let store = SqliteStore::new(None)?;
//! store.add_item("sonnet-18-line-1", 0)?;
//!
//! let engine = Engine::new(store);
//! let session = engine.start_session("learner-1", SessionType::Mixed, SessionOptions::default())?;
//!
//! while let Some(item_id) = engine.get_next_item(&session.id)? {
//!     // caller shows the item, observes recall, measures elapsed time
//!     engine.submit_result(&session.id, &item_id, true, 4, Some(6.2))?;
//! }
//!
//! let summary = engine.end_session(&session.id)?;
//! let analytics = engine.get_stats("learner-1", StatsWindow::default())?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod error;
pub mod queue;
pub mod review;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Review types
pub use review::{
    Mastery, ReviewState, SessionType, StudyResult, StudySession, INITIAL_EASE_FACTOR,
    MIN_EASE_FACTOR,
};

// SM-2 scheduler
pub use scheduler::{
    advance, FIRST_INTERVAL_DAYS, LAPSE_EASE_PENALTY, SECOND_INTERVAL_DAYS,
};

// Queue builder
pub use queue::{build_queue, QueueConfig, QueuePlan};

// Session manager / engine facade
pub use session::{Engine, SessionOptions};

// Stats aggregator
pub use stats::{
    ItemDifficulty, LearningAnalytics, StatsAggregator, StatsWindow, DEFAULT_MIN_REVIEWS,
};

// Storage layer
pub use error::{EngineError, Result};
pub use storage::{ReviewStore, SqliteStore, StoreError, StoreResult};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Engine, EngineError, LearningAnalytics, Mastery, Result, ReviewState, ReviewStore,
        SessionOptions, SessionType, SqliteStore, StatsWindow, StudyResult, StudySession,
    };
}

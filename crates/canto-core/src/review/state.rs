//! Review state - the fundamental unit of scheduling
//!
//! Each `ReviewState` tracks one (learner, item) pair:
//! - SM-2 scheduling state (interval, repetition number, ease factor)
//! - Streak and lifetime counters
//! - Next due date

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum ease factor; SM-2 never lets ease fall below this
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor assigned on first exposure
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

// ============================================================================
// SESSION TYPES
// ============================================================================

/// Types of study sessions
///
/// Closed enum: the queue builder dispatches on this, so invalid session
/// types are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Unseen items only, in canonical order
    New,
    /// Due items only, most overdue first
    #[default]
    Review,
    /// Due items plus unseen items filling remaining capacity
    Mixed,
    /// Caller-supplied explicit item subset
    Focused,
}

impl SessionType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::New => "new",
            SessionType::Review => "review",
            SessionType::Mixed => "mixed",
            SessionType::Focused => "focused",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(SessionType::New),
            "review" => Ok(SessionType::Review),
            "mixed" => Ok(SessionType::Mixed),
            "focused" => Ok(SessionType::Focused),
            _ => Err(format!("Unknown session type: {}", s)),
        }
    }
}

// ============================================================================
// REVIEW STATE
// ============================================================================

/// Per-(learner, item) scheduling state
///
/// Created lazily on first exposure, mutated exactly once per recorded
/// result, never deleted.
///
/// Invariants: `ease_factor >= 1.3`, `interval_days >= 1`;
/// `repetition_number` and `consecutive_correct` reset to 0 together on
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// Learner half of the composite identity
    pub learner_id: String,
    /// Item half of the composite identity
    pub item_id: String,
    /// Item is eligible for review when now >= this value
    pub next_due_at: DateTime<Utc>,
    /// Days until next due date after a successful review
    pub interval_days: i64,
    /// Consecutive successful reviews since last failure
    pub repetition_number: i64,
    /// Multiplier controlling interval growth; higher = easier
    pub ease_factor: f64,
    /// Streak of correct outcomes, reset to 0 on failure
    pub consecutive_correct: i64,
    /// Lifetime count of recorded outcomes
    pub total_reviews: i64,
    /// When the item was last studied, absent if never
    pub last_studied_at: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// Check if this item is due for review at the given time
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due_at <= now
    }
}

// ============================================================================
// STUDY SESSION
// ============================================================================

/// One bounded study interaction producing zero or more results
///
/// Lifecycle: created at session start, mutated only by appending results
/// and by the single end-of-session finalization write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Owning learner
    pub learner_id: String,
    /// Queue composition policy for this session
    pub session_type: SessionType,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session ended; absent while active
    pub ended_at: Option<DateTime<Utc>>,
    /// Count of results recorded in this session
    pub items_studied: i64,
    /// Count of correct results recorded in this session
    pub correct_count: i64,
    /// Mean response time over the session's results, derived at end
    pub average_response_seconds: Option<f64>,
}

impl StudySession {
    /// Create a new active session for the given learner
    pub fn start(learner_id: impl Into<String>, session_type: SessionType, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            learner_id: learner_id.into(),
            session_type,
            started_at: now,
            ended_at: None,
            items_studied: 0,
            correct_count: 0,
            average_response_seconds: None,
        }
    }

    /// A session is active until finalized
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

// ============================================================================
// STUDY RESULT
// ============================================================================

/// One recorded outcome for one item in one session
///
/// Immutable once written; the append-only history forms the audit trail
/// the stats aggregator reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyResult {
    /// Session this result belongs to
    pub session_id: String,
    /// Item that was reviewed
    pub item_id: String,
    /// Learner who reviewed it
    pub learner_id: String,
    /// Whether recall succeeded
    pub was_correct: bool,
    /// Self-assessed difficulty, 1 (very hard) to 5 (very easy)
    pub difficulty_rating: u8,
    /// Elapsed response time, supplied by the caller
    pub response_seconds: Option<f64>,
    /// When the outcome was recorded
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// MASTERY
// ============================================================================

/// Mastery classification for one (learner, item) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mastery {
    /// No review state exists yet
    New,
    /// Has a review state but fewer than 3 consecutive correct
    Learning,
    /// At least 3 consecutive correct reviews
    Mastered,
}

impl Mastery {
    /// Consecutive-correct threshold for the Mastered classification
    pub const THRESHOLD: i64 = 3;

    /// Classify an optional review state
    pub fn of(state: Option<&ReviewState>) -> Self {
        match state {
            None => Mastery::New,
            Some(s) if s.consecutive_correct >= Self::THRESHOLD => Mastery::Mastered,
            Some(_) => Mastery::Learning,
        }
    }
}

impl std::fmt::Display for Mastery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mastery::New => write!(f, "new"),
            Mastery::Learning => write!(f, "learning"),
            Mastery::Mastered => write!(f, "mastered"),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

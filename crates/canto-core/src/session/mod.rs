//! Session Manager Module
//!
//! Governs the lifecycle of one study session (Created → Active →
//! Completed), forwards outcomes to the scheduler, and persists everything
//! through the injected review store. This is the caller-facing facade of
//! the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::queue::{build_queue, QueueConfig, QueuePlan};
use crate::review::{ReviewState, SessionType, StudyResult, StudySession};
use crate::scheduler;
use crate::stats::{LearningAnalytics, StatsAggregator, StatsWindow};
use crate::storage::{ReviewStore, StoreResult};

/// Caller-supplied knobs for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Maximum due items for a review session
    pub due_limit: usize,
    /// Maximum unseen items for a new session
    pub new_limit: usize,
    /// Explicit item subset, required for focused sessions
    pub focused_items: Option<Vec<String>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            due_limit: 50,
            new_limit: 10,
            focused_items: None,
        }
    }
}

/// In-memory state for one active session.
///
/// The queue is fixed at creation; items that become due later are not
/// retroactively injected.
struct ActiveSession {
    session: StudySession,
    queue: Vec<String>,
    cursor: usize,
}

/// The engine facade: session lifecycle, result recording, analytics.
///
/// All methods take `&self`; active sessions live behind a `Mutex` so the
/// engine is `Send + Sync` and can be shared behind an `Arc`. The engine is
/// invoked synchronously per user action and runs no background tasks.
pub struct Engine<S: ReviewStore> {
    store: S,
    queue_config: QueueConfig,
    active: Mutex<HashMap<String, ActiveSession>>,
}

impl<S: ReviewStore> Engine<S> {
    /// Create an engine over the given store with default queue sizing
    pub fn new(store: S) -> Self {
        Self::with_queue_config(store, QueueConfig::default())
    }

    /// Create an engine with explicit queue sizing
    pub fn with_queue_config(store: S, queue_config: QueueConfig) -> Self {
        Self {
            store,
            queue_config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a new study session for a learner.
    ///
    /// The queue is built immediately and stays fixed for the life of the
    /// session. An empty queue is valid; the session can be ended with zero
    /// items studied.
    pub fn start_session(
        &self,
        learner_id: &str,
        session_type: SessionType,
        options: SessionOptions,
    ) -> Result<StudySession> {
        if learner_id.is_empty() {
            return Err(EngineError::Validation("learner id must not be empty".into()));
        }

        let now = Utc::now();
        let plan = QueuePlan::for_session(
            session_type,
            options.due_limit,
            options.new_limit,
            options.focused_items,
            &self.queue_config,
        )?;
        let queue = build_queue(&self.store, learner_id, &plan, now)?;

        let session = StudySession::start(learner_id, session_type, now);
        with_retry("create session", || self.store.create_session(&session))?;

        tracing::info!(
            session_id = %session.id,
            learner_id,
            session_type = %session_type,
            queue_len = queue.len(),
            "session started"
        );

        let mut active = self.lock_active()?;
        active.insert(
            session.id.clone(),
            ActiveSession {
                session: session.clone(),
                queue,
                cursor: 0,
            },
        );
        Ok(session)
    }

    /// Yield the next queued item for an active session, or `None` when the
    /// queue is exhausted.
    pub fn get_next_item(&self, session_id: &str) -> Result<Option<String>> {
        let mut active = self.lock_active()?;
        let entry = match active.get_mut(session_id) {
            Some(entry) => entry,
            None => return Err(self.missing_session_error(session_id)),
        };

        let item = entry.queue.get(entry.cursor).cloned();
        if item.is_some() {
            entry.cursor += 1;
        }
        Ok(item)
    }

    /// Record one outcome: advance the schedule, append the result, bump
    /// session counters.
    ///
    /// Counters update only after both persistence writes succeed, so a
    /// storage failure leaves no partial session state. Re-submitting the
    /// same (session, item) pair is not deduplicated: it appends a second
    /// result and re-advances from the now-current review state.
    pub fn submit_result(
        &self,
        session_id: &str,
        item_id: &str,
        was_correct: bool,
        difficulty_rating: u8,
        response_seconds: Option<f64>,
    ) -> Result<ReviewState> {
        let mut active = self.lock_active()?;
        let entry = match active.get_mut(session_id) {
            Some(entry) => entry,
            None => return Err(self.missing_session_error(session_id)),
        };

        if item_id.is_empty() {
            return Err(EngineError::Validation("item id must not be empty".into()));
        }
        if !(1..=5).contains(&difficulty_rating) {
            return Err(EngineError::Validation(format!(
                "difficulty rating must be 1..=5, got {}",
                difficulty_rating
            )));
        }

        let learner_id = entry.session.learner_id.clone();
        let now = Utc::now();

        let prior = with_retry("read review state", || {
            self.store.get_review_state(&learner_id, item_id)
        })?;
        let next = scheduler::advance(
            &learner_id,
            item_id,
            prior.as_ref(),
            was_correct,
            difficulty_rating,
            now,
        )?;

        with_retry("upsert review state", || {
            self.store.upsert_review_state(&next)
        })?;
        with_retry("append study result", || {
            self.store.append_study_result(&StudyResult {
                session_id: session_id.to_string(),
                item_id: item_id.to_string(),
                learner_id: learner_id.clone(),
                was_correct,
                difficulty_rating,
                response_seconds,
                recorded_at: now,
            })
        })?;

        entry.session.items_studied += 1;
        if was_correct {
            entry.session.correct_count += 1;
        }

        tracing::debug!(
            session_id,
            item_id,
            was_correct,
            interval_days = next.interval_days,
            "result recorded"
        );
        Ok(next)
    }

    /// End a session, computing its summary and writing the finalization
    /// record.
    ///
    /// Idempotent: ending an already-Completed session returns the stored
    /// summary without touching anything.
    pub fn end_session(&self, session_id: &str) -> Result<StudySession> {
        let mut active = self.lock_active()?;
        let entry = match active.remove(session_id) {
            Some(entry) => entry,
            None => {
                // Already completed (or never existed)
                let stored = with_retry("read session", || self.store.get_session(session_id))?;
                return stored.ok_or_else(|| {
                    EngineError::NotFound(format!("session {}", session_id))
                });
            }
        };

        let results = match with_retry("read session results", || {
            self.store.results_for_session(session_id)
        }) {
            Ok(results) => results,
            Err(e) => {
                // Keep the session active so the caller can retry the end
                active.insert(session_id.to_string(), entry);
                return Err(e);
            }
        };

        let ActiveSession {
            mut session,
            queue,
            cursor,
        } = entry;
        session.ended_at = Some(Utc::now());
        session.average_response_seconds = average_response_seconds(&results);

        if let Err(e) = with_retry("finalize session", || self.store.finalize_session(&session)) {
            // Roll the end back so the caller can retry
            session.ended_at = None;
            session.average_response_seconds = None;
            active.insert(
                session_id.to_string(),
                ActiveSession {
                    session,
                    queue,
                    cursor,
                },
            );
            return Err(e);
        }

        tracing::info!(
            session_id,
            items_studied = session.items_studied,
            correct_count = session.correct_count,
            "session ended"
        );
        Ok(session)
    }

    /// Derived analytics for a learner over the given window
    pub fn get_stats(&self, learner_id: &str, window: StatsWindow) -> Result<LearningAnalytics> {
        StatsAggregator::new(&self.store).analytics(learner_id, window, Utc::now())
    }

    fn lock_active(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ActiveSession>>> {
        self.active
            .lock()
            .map_err(|_| EngineError::Conflict("active session table poisoned".into()))
    }

    /// Distinguish an unknown session from one that already completed
    fn missing_session_error(&self, session_id: &str) -> EngineError {
        match self.store.get_session(session_id) {
            Ok(Some(_)) => {
                EngineError::SessionNotActive(format!("session {} already ended", session_id))
            }
            Ok(None) => EngineError::NotFound(format!("session {}", session_id)),
            Err(e) => EngineError::Storage(e),
        }
    }
}

/// Mean response time over a session's results, `None` when no result
/// carries a response time
fn average_response_seconds(results: &[StudyResult]) -> Option<f64> {
    let times: Vec<f64> = results.iter().filter_map(|r| r.response_seconds).collect();
    if times.is_empty() {
        return None;
    }
    Some(times.iter().sum::<f64>() / times.len() as f64)
}

/// Run one store operation, retrying once on failure before surfacing the
/// error to the caller
fn with_retry<T>(what: &str, mut op: impl FnMut() -> StoreResult<T>) -> Result<T> {
    match op() {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "{} failed, retrying once", what);
            op().map_err(EngineError::from)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Queue Builder Module
//!
//! Selects which items enter a study session: due reviews, unseen material,
//! or a caller-supplied focused subset, depending on the session type.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::review::SessionType;
use crate::storage::ReviewStore;

/// Queue sizing configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Target number of items per mixed session
    pub daily_goal: usize,
    /// Share of a mixed session reserved for due reviews
    pub due_share: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            daily_goal: 20,
            due_share: 0.7,
        }
    }
}

/// How to fill a session queue
///
/// Produced by [`QueuePlan::for_session`] from the session type and the
/// caller's limits, then executed against the store.
#[derive(Debug, Clone)]
pub enum QueuePlan {
    /// Due items only
    Review {
        /// Maximum due items to pull
        due_limit: usize,
    },
    /// Unseen items only, canonical order
    New {
        /// Maximum unseen items to pull
        new_limit: usize,
    },
    /// Due items up to the due share, unseen items filling the rest
    Mixed {
        /// Due items capped at this many
        due_limit: usize,
        /// Unseen items fill up to this many more
        new_limit: usize,
    },
    /// Explicit item subset, bypassing due/new selection
    Focused {
        /// Items to study, in caller order
        items: Vec<String>,
    },
}

impl QueuePlan {
    /// Build the plan for a session type.
    ///
    /// `focused_items` is required for [`SessionType::Focused`] and ignored
    /// otherwise. Limits must be non-zero for the session types that use
    /// them; zero is rejected before any store access.
    pub fn for_session(
        session_type: SessionType,
        due_limit: usize,
        new_limit: usize,
        focused_items: Option<Vec<String>>,
        config: &QueueConfig,
    ) -> Result<Self> {
        match session_type {
            SessionType::Review => {
                if due_limit == 0 {
                    return Err(EngineError::Validation(
                        "due limit must be positive for a review session".into(),
                    ));
                }
                Ok(QueuePlan::Review { due_limit })
            }
            SessionType::New => {
                if new_limit == 0 {
                    return Err(EngineError::Validation(
                        "new limit must be positive for a new session".into(),
                    ));
                }
                Ok(QueuePlan::New { new_limit })
            }
            SessionType::Mixed => {
                if config.daily_goal == 0 {
                    return Err(EngineError::Validation(
                        "daily goal must be positive for a mixed session".into(),
                    ));
                }
                let due = ((config.daily_goal as f64 * config.due_share).ceil() as usize)
                    .min(config.daily_goal);
                Ok(QueuePlan::Mixed {
                    due_limit: due,
                    new_limit: config.daily_goal - due,
                })
            }
            SessionType::Focused => match focused_items {
                Some(items) => Ok(QueuePlan::Focused { items }),
                None => Err(EngineError::Validation(
                    "focused session requires an explicit item list".into(),
                )),
            },
        }
    }
}

/// Build the ordered item queue for one session.
///
/// Due items come back most overdue first; unseen items in canonical
/// position order. An empty queue is valid — the session simply completes
/// with zero items.
pub fn build_queue<S: ReviewStore>(
    store: &S,
    learner_id: &str,
    plan: &QueuePlan,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let queue = match plan {
        QueuePlan::Review { due_limit } => store
            .get_due_items(learner_id, now, *due_limit)?
            .into_iter()
            .map(|s| s.item_id)
            .collect(),
        QueuePlan::New { new_limit } => store.get_unseen_items(learner_id, *new_limit)?,
        QueuePlan::Mixed {
            due_limit,
            new_limit,
        } => {
            let mut queue: Vec<String> = store
                .get_due_items(learner_id, now, *due_limit)?
                .into_iter()
                .map(|s| s.item_id)
                .collect();
            // New material fills whatever capacity the due set left unused
            let capacity = due_limit + new_limit - queue.len();
            queue.extend(store.get_unseen_items(learner_id, capacity)?);
            queue
        }
        QueuePlan::Focused { items } => items.clone(),
    };

    tracing::debug!(
        learner_id,
        queue_len = queue.len(),
        "built session queue"
    );
    Ok(queue)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::ReviewState;
    use crate::storage::SqliteStore;
    use chrono::Duration;

    fn seed_store(items: i64, due: &[i64]) -> (SqliteStore, DateTime<Utc>) {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        for i in 0..items {
            store.add_item(&format!("item-{}", i), i).unwrap();
        }
        for &i in due {
            store
                .upsert_review_state(&ReviewState {
                    learner_id: "l1".into(),
                    item_id: format!("item-{}", i),
                    next_due_at: now - Duration::days(i + 1),
                    interval_days: 1,
                    repetition_number: 0,
                    ease_factor: 2.5,
                    consecutive_correct: 0,
                    total_reviews: 1,
                    last_studied_at: Some(now - Duration::days(i + 2)),
                })
                .unwrap();
        }
        (store, now)
    }

    #[test]
    fn test_review_plan_due_only() {
        let (store, now) = seed_store(5, &[0, 2]);
        let plan = QueuePlan::for_session(
            SessionType::Review,
            10,
            0,
            None,
            &QueueConfig::default(),
        )
        .unwrap();
        let queue = build_queue(&store, "l1", &plan, now).unwrap();
        // Most overdue first: item-2 was due 3 days ago, item-0 one day ago
        assert_eq!(queue, vec!["item-2", "item-0"]);
    }

    #[test]
    fn test_review_plan_empty_queue_is_valid() {
        let (store, now) = seed_store(3, &[]);
        let plan = QueuePlan::for_session(
            SessionType::Review,
            10,
            0,
            None,
            &QueueConfig::default(),
        )
        .unwrap();
        let queue = build_queue(&store, "l1", &plan, now).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_new_plan_canonical_order() {
        let (store, now) = seed_store(4, &[1]);
        let plan =
            QueuePlan::for_session(SessionType::New, 0, 2, None, &QueueConfig::default())
                .unwrap();
        let queue = build_queue(&store, "l1", &plan, now).unwrap();
        assert_eq!(queue, vec!["item-0", "item-2"]);
    }

    #[test]
    fn test_mixed_plan_split() {
        // daily_goal 10, due_share 0.7 -> 7 due slots, 3 new slots
        let (store, now) = seed_store(20, &[0, 1, 2]);
        let config = QueueConfig {
            daily_goal: 10,
            due_share: 0.7,
        };
        let plan = QueuePlan::for_session(SessionType::Mixed, 0, 0, None, &config).unwrap();
        let queue = build_queue(&store, "l1", &plan, now).unwrap();
        // 3 due items, new material fills the remaining 7 slots
        assert_eq!(queue.len(), 10);
        assert_eq!(queue[0], "item-2");
        assert_eq!(queue[3], "item-3");
    }

    #[test]
    fn test_focused_plan_passthrough() {
        let (store, now) = seed_store(3, &[]);
        let plan = QueuePlan::for_session(
            SessionType::Focused,
            0,
            0,
            Some(vec!["item-2".into(), "item-0".into()]),
            &QueueConfig::default(),
        )
        .unwrap();
        let queue = build_queue(&store, "l1", &plan, now).unwrap();
        assert_eq!(queue, vec!["item-2", "item-0"]);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = QueueConfig::default();
        assert!(matches!(
            QueuePlan::for_session(SessionType::Review, 0, 5, None, &config),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            QueuePlan::for_session(SessionType::New, 5, 0, None, &config),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            QueuePlan::for_session(SessionType::Focused, 5, 5, None, &config),
            Err(EngineError::Validation(_))
        ));
    }
}

//! SM-2 Scheduler Module
//!
//! Computes the next review state from a prior state and an observed
//! outcome. Pure and deterministic: no side effects, no I/O, no clock —
//! `now` is an explicit input, which keeps the function unit-testable
//! against literal input/output pairs.
//!
//! Reference: SuperMemo SM-2 ease/interval model.
//!
//! ## Core formulas
//! - Ease delta: `0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)` for rating `q`
//! - Interval ladder: 1 day, 6 days, then `round(interval * ease)`
//! - Ease floor: 1.3; lapse penalty: -0.2

use chrono::{DateTime, Duration, Utc};

use crate::error::EngineError;
use crate::review::{ReviewState, INITIAL_EASE_FACTOR, MIN_EASE_FACTOR};

/// Interval after the first successful repetition
pub const FIRST_INTERVAL_DAYS: i64 = 1;

/// Interval after the second successful repetition
pub const SECOND_INTERVAL_DAYS: i64 = 6;

/// Ease factor penalty applied on a failed review
pub const LAPSE_EASE_PENALTY: f64 = 0.2;

/// Advance a review schedule by one observed outcome.
///
/// With no prior state (first exposure) this seeds a near-term re-check one
/// day out regardless of outcome. Otherwise a correct outcome grows the
/// interval along the SM-2 ladder and nudges the ease factor by the rating;
/// a failure resets the interval and streak counters and penalizes ease.
///
/// `difficulty_rating` outside 1..=5 is rejected; the scheduler never
/// clamps silently.
pub fn advance(
    learner_id: &str,
    item_id: &str,
    prior: Option<&ReviewState>,
    was_correct: bool,
    difficulty_rating: u8,
    now: DateTime<Utc>,
) -> Result<ReviewState, EngineError> {
    if !(1..=5).contains(&difficulty_rating) {
        return Err(EngineError::Validation(format!(
            "difficulty rating must be 1..=5, got {}",
            difficulty_rating
        )));
    }

    let prior = match prior {
        Some(prior) => prior,
        None => {
            return Ok(ReviewState {
                learner_id: learner_id.to_string(),
                item_id: item_id.to_string(),
                next_due_at: now + Duration::days(FIRST_INTERVAL_DAYS),
                interval_days: FIRST_INTERVAL_DAYS,
                repetition_number: 0,
                ease_factor: INITIAL_EASE_FACTOR,
                consecutive_correct: if was_correct { 1 } else { 0 },
                total_reviews: 1,
                last_studied_at: Some(now),
            });
        }
    };

    let (interval_days, repetition_number, consecutive_correct, ease_factor) = if was_correct {
        let repetitions = prior.repetition_number + 1;
        let ease = (prior.ease_factor + ease_delta(difficulty_rating)).max(MIN_EASE_FACTOR);
        let interval = match repetitions {
            1 => FIRST_INTERVAL_DAYS,
            2 => SECOND_INTERVAL_DAYS,
            _ => ((prior.interval_days as f64 * ease).round() as i64).max(1),
        };
        (interval, repetitions, prior.consecutive_correct + 1, ease)
    } else {
        let ease = (prior.ease_factor - LAPSE_EASE_PENALTY).max(MIN_EASE_FACTOR);
        (FIRST_INTERVAL_DAYS, 0, 0, ease)
    };

    Ok(ReviewState {
        learner_id: learner_id.to_string(),
        item_id: item_id.to_string(),
        next_due_at: now + Duration::days(interval_days),
        interval_days,
        repetition_number,
        ease_factor,
        consecutive_correct,
        total_reviews: prior.total_reviews + 1,
        last_studied_at: Some(now),
    })
}

/// SM-2 ease factor adjustment for a rating in 1..=5.
///
/// Rating 5 increases ease, rating 3 is almost neutral, ratings below 3
/// shrink it.
fn ease_delta(rating: u8) -> f64 {
    let q = rating as f64;
    0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)
}

// ============================================================================
// TESTS
// ============================================================================

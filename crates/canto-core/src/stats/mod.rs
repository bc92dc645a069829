//! Stats Aggregator Module
//!
//! Read-only analytics computed on demand from session/result history.
//! Queries never mutate state; missing history yields zero-valued
//! statistics rather than an error.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::review::{Mastery, StudyResult, StudySession};
use crate::storage::ReviewStore;

/// Minimum recorded reviews before an item appears in the difficulty ranking
pub const DEFAULT_MIN_REVIEWS: usize = 5;

// ============================================================================
// ANALYTICS TYPES
// ============================================================================

/// Time window for analytics queries; unbounded sides are `None`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsWindow {
    /// Inclusive lower bound on session end / result recording time
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub until: Option<DateTime<Utc>>,
}

impl StatsWindow {
    /// Window covering the trailing `days` days from `now`
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            from: Some(now - chrono::Duration::days(days)),
            until: Some(now),
        }
    }
}

/// Per-item difficulty summary derived from result history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDifficulty {
    /// Item identifier
    pub item_id: String,
    /// Recorded outcomes for this item
    pub review_count: i64,
    /// Share of correct outcomes (0.0 to 1.0)
    pub success_rate: f64,
    /// Mean self-assessed difficulty rating (1 hard .. 5 easy)
    pub avg_difficulty_rating: f64,
}

/// Derived analytics for one learner
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningAnalytics {
    /// Consecutive calendar days with a completed session, ending today
    pub study_streak_days: u32,
    /// Completed sessions inside the window
    pub sessions_completed: i64,
    /// Results recorded inside the window
    pub items_studied: i64,
    /// Correct results inside the window
    pub correct_count: i64,
    /// `correct_count / items_studied`, 0.0 when nothing studied
    pub success_rate: f64,
    /// Hardest items first (ascending success rate over full history)
    pub hardest_items: Vec<ItemDifficulty>,
    /// Items with at least 3 consecutive correct reviews
    pub mastered_items: i64,
    /// Items with a review state but not yet mastered
    pub learning_items: i64,
}

// ============================================================================
// PURE HELPERS
// ============================================================================

/// Count consecutive calendar days with study activity, walking backward
/// from `today`. Breaks on the first gap day, so a learner with no
/// completed session today has a streak of zero.
pub fn study_streak(today: NaiveDate, study_days: &HashSet<NaiveDate>) -> u32 {
    let mut streak = 0;
    let mut day = today;
    while study_days.contains(&day) {
        streak += 1;
        day = day - chrono::Duration::days(1);
    }
    streak
}

/// Aggregate success rate over sessions: `sum(correct) / sum(studied)`
pub fn success_rate(sessions: &[StudySession]) -> f64 {
    let studied: i64 = sessions.iter().map(|s| s.items_studied).sum();
    if studied == 0 {
        return 0.0;
    }
    let correct: i64 = sessions.iter().map(|s| s.correct_count).sum();
    correct as f64 / studied as f64
}

/// Per-item difficulty over a result history, hardest first.
///
/// Items with fewer than `min_reviews` outcomes are excluded.
pub fn rank_item_difficulty(results: &[StudyResult], min_reviews: usize) -> Vec<ItemDifficulty> {
    let mut by_item: BTreeMap<&str, (i64, i64, i64)> = BTreeMap::new();
    for result in results {
        let entry = by_item.entry(result.item_id.as_str()).or_default();
        entry.0 += 1;
        if result.was_correct {
            entry.1 += 1;
        }
        entry.2 += result.difficulty_rating as i64;
    }

    let mut ranked: Vec<ItemDifficulty> = by_item
        .into_iter()
        .filter(|(_, (count, _, _))| *count >= min_reviews as i64)
        .map(|(item_id, (count, correct, rating_sum))| ItemDifficulty {
            item_id: item_id.to_string(),
            review_count: count,
            success_rate: correct as f64 / count as f64,
            avg_difficulty_rating: rating_sum as f64 / count as f64,
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.success_rate
            .partial_cmp(&b.success_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Computes [`LearningAnalytics`] from a review store
pub struct StatsAggregator<'a, S: ReviewStore> {
    store: &'a S,
    min_reviews: usize,
}

impl<'a, S: ReviewStore> StatsAggregator<'a, S> {
    /// Create an aggregator with the default difficulty-ranking threshold
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            min_reviews: DEFAULT_MIN_REVIEWS,
        }
    }

    /// Override the minimum reviews required for the difficulty ranking
    pub fn with_min_reviews(mut self, min_reviews: usize) -> Self {
        self.min_reviews = min_reviews;
        self
    }

    /// Compute the full analytics bundle for one learner
    pub fn analytics(
        &self,
        learner_id: &str,
        window: StatsWindow,
        now: DateTime<Utc>,
    ) -> Result<LearningAnalytics> {
        // Streak looks at the whole completed-session history, not the window
        let all_sessions = self.store.completed_sessions(learner_id, None, None)?;
        let study_days: HashSet<NaiveDate> = all_sessions
            .iter()
            .filter_map(|s| s.ended_at)
            .map(|dt| dt.date_naive())
            .collect();
        let streak = study_streak(now.date_naive(), &study_days);

        let windowed = self
            .store
            .completed_sessions(learner_id, window.from, window.until)?;
        let items_studied: i64 = windowed.iter().map(|s| s.items_studied).sum();
        let correct_count: i64 = windowed.iter().map(|s| s.correct_count).sum();

        let history = self.store.results_for_learner(learner_id, None, None)?;
        let hardest = rank_item_difficulty(&history, self.min_reviews);

        let states = self.store.review_states_for_learner(learner_id)?;
        let mastered = states
            .iter()
            .filter(|s| Mastery::of(Some(s)) == Mastery::Mastered)
            .count() as i64;

        Ok(LearningAnalytics {
            study_streak_days: streak,
            sessions_completed: windowed.len() as i64,
            items_studied,
            correct_count,
            success_rate: success_rate(&windowed),
            hardest_items: hardest,
            mastered_items: mastered,
            learning_items: states.len() as i64 - mastered,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::SessionType;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 20).unwrap() + Duration::days(offset)
    }

    fn completed_session(studied: i64, correct: i64) -> StudySession {
        let now = Utc::now();
        let mut session = StudySession::start("l1", SessionType::Review, now);
        session.ended_at = Some(now);
        session.items_studied = studied;
        session.correct_count = correct;
        session
    }

    fn result(item: &str, correct: bool, rating: u8) -> StudyResult {
        StudyResult {
            session_id: "s1".into(),
            item_id: item.into(),
            learner_id: "l1".into(),
            was_correct: correct,
            difficulty_rating: rating,
            response_seconds: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_streak_breaks_on_gap_day() {
        // Sessions on D-3, D-2, D, D with no session on D-1: streak is 1
        let days: HashSet<NaiveDate> = [day(-3), day(-2), day(0), day(0)].into_iter().collect();
        assert_eq!(study_streak(day(0), &days), 1);
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let days: HashSet<NaiveDate> = [day(-2), day(-1), day(0)].into_iter().collect();
        assert_eq!(study_streak(day(0), &days), 3);
    }

    #[test]
    fn test_streak_zero_without_session_today() {
        let days: HashSet<NaiveDate> = [day(-1), day(-2)].into_iter().collect();
        assert_eq!(study_streak(day(0), &days), 0);
        assert_eq!(study_streak(day(0), &HashSet::new()), 0);
    }

    #[test]
    fn test_success_rate_over_sessions() {
        let sessions = vec![completed_session(10, 7), completed_session(5, 4)];
        assert!((success_rate(&sessions) - 11.0 / 15.0).abs() < 1e-9);
        assert_eq!(success_rate(&[]), 0.0);
        assert_eq!(success_rate(&[completed_session(0, 0)]), 0.0);
    }

    #[test]
    fn test_difficulty_ranking_hardest_first() {
        let mut results = Vec::new();
        // easy-item: 5/5 correct
        for _ in 0..5 {
            results.push(result("easy-item", true, 5));
        }
        // hard-item: 1/5 correct
        results.push(result("hard-item", true, 2));
        for _ in 0..4 {
            results.push(result("hard-item", false, 1));
        }
        // rarely-seen: below the threshold, excluded
        results.push(result("rarely-seen", false, 1));

        let ranked = rank_item_difficulty(&results, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item_id, "hard-item");
        assert!((ranked[0].success_rate - 0.2).abs() < 1e-9);
        assert!((ranked[0].avg_difficulty_rating - 1.2).abs() < 1e-9);
        assert_eq!(ranked[1].item_id, "easy-item");
        assert!((ranked[1].success_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_yields_zero_analytics() {
        let store = crate::storage::SqliteStore::in_memory().unwrap();
        let aggregator = StatsAggregator::new(&store);
        let analytics = aggregator
            .analytics("nobody", StatsWindow::default(), Utc::now())
            .unwrap();
        assert_eq!(analytics.study_streak_days, 0);
        assert_eq!(analytics.sessions_completed, 0);
        assert_eq!(analytics.items_studied, 0);
        assert_eq!(analytics.success_rate, 0.0);
        assert!(analytics.hardest_items.is_empty());
        assert_eq!(analytics.mastered_items, 0);
        assert_eq!(analytics.learning_items, 0);
    }
}

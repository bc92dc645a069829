//! SQLite Review Store Implementation
//!
//! Reference implementation of the [`ReviewStore`] contract.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::review::{ReviewState, SessionType, StudyResult, StudySession};
use crate::storage::{ReviewStore, StoreError, StoreResult};

/// SQLite-backed review state store
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, making the store `Send + Sync` so callers can
/// share it behind an `Arc` without an outer mutex. Per-key atomicity of
/// the upsert comes from a single `INSERT .. ON CONFLICT DO UPDATE`
/// statement executed on the writer connection.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Create a new store at the given path, or the platform default
    pub fn new(db_path: Option<PathBuf>) -> StoreResult<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "canto", "core").ok_or_else(|| {
                    StoreError::Init("Could not determine project directories".to_string())
                })?;

                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Restrict directory permissions to owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("canto.db")
            }
        };

        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Create a store backed by a private in-memory database.
    ///
    /// Shared-cache URI so the reader and writer connections see the same
    /// data. Intended for tests.
    pub fn in_memory() -> StoreResult<Self> {
        let uri = format!(
            "file:canto-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Register an item in the catalog with its canonical ordering key.
    ///
    /// Content import happens outside the engine; the store only needs the
    /// id and the position used for new-item selection.
    pub fn add_item(&self, item_id: &str, position: i64) -> StoreResult<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO items (id, position) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET position = excluded.position",
            params![item_id, position],
        )?;
        Ok(())
    }

    /// Number of items in the catalog
    pub fn item_count(&self) -> StoreResult<i64> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let count = reader.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    /// Convert a row to ReviewState
    fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<ReviewState> {
        let next_due_at: String = row.get("next_due_at")?;
        let last_studied_at: Option<String> = row.get("last_studied_at")?;

        let next_due_at = Self::parse_timestamp(&next_due_at, "next_due_at")?;
        let last_studied_at = last_studied_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(ReviewState {
            learner_id: row.get("learner_id")?,
            item_id: row.get("item_id")?,
            next_due_at,
            interval_days: row.get("interval_days")?,
            repetition_number: row.get("repetition_number")?,
            ease_factor: row.get("ease_factor")?,
            consecutive_correct: row.get("consecutive_correct")?,
            total_reviews: row.get("total_reviews")?,
            last_studied_at,
        })
    }

    /// Convert a row to StudySession
    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<StudySession> {
        let session_type: String = row.get("session_type")?;
        let session_type = session_type.parse::<SessionType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;

        let started_at = Self::parse_timestamp(&started_at, "started_at")?;
        let ended_at = ended_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(StudySession {
            id: row.get("id")?,
            learner_id: row.get("learner_id")?,
            session_type,
            started_at,
            ended_at,
            items_studied: row.get("items_studied")?,
            correct_count: row.get("correct_count")?,
            average_response_seconds: row.get("average_response_seconds")?,
        })
    }

    /// Convert a row to StudyResult
    fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<StudyResult> {
        let recorded_at: String = row.get("recorded_at")?;
        let recorded_at = Self::parse_timestamp(&recorded_at, "recorded_at")?;

        Ok(StudyResult {
            session_id: row.get("session_id")?,
            item_id: row.get("item_id")?,
            learner_id: row.get("learner_id")?,
            was_correct: row.get("was_correct")?,
            difficulty_rating: row.get("difficulty_rating")?,
            response_seconds: row.get("response_seconds")?,
            recorded_at,
        })
    }
}

impl ReviewStore for SqliteStore {
    fn get_review_state(
        &self,
        learner_id: &str,
        item_id: &str,
    ) -> StoreResult<Option<ReviewState>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM review_states WHERE learner_id = ?1 AND item_id = ?2",
        )?;

        let state = stmt
            .query_row(params![learner_id, item_id], |row| Self::row_to_state(row))
            .optional()?;
        Ok(state)
    }

    fn upsert_review_state(&self, state: &ReviewState) -> StoreResult<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO review_states (
                learner_id, item_id, next_due_at, interval_days,
                repetition_number, ease_factor, consecutive_correct,
                total_reviews, last_studied_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(learner_id, item_id) DO UPDATE SET
                next_due_at = excluded.next_due_at,
                interval_days = excluded.interval_days,
                repetition_number = excluded.repetition_number,
                ease_factor = excluded.ease_factor,
                consecutive_correct = excluded.consecutive_correct,
                total_reviews = excluded.total_reviews,
                last_studied_at = excluded.last_studied_at",
            params![
                state.learner_id,
                state.item_id,
                state.next_due_at.to_rfc3339(),
                state.interval_days,
                state.repetition_number,
                state.ease_factor,
                state.consecutive_correct,
                state.total_reviews,
                state.last_studied_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn get_due_items(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<ReviewState>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM review_states
             WHERE learner_id = ?1 AND next_due_at <= ?2
             ORDER BY next_due_at ASC
             LIMIT ?3",
        )?;

        let states = stmt
            .query_map(
                params![learner_id, now.to_rfc3339(), limit as i64],
                |row| Self::row_to_state(row),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }

    fn get_unseen_items(&self, learner_id: &str, limit: usize) -> StoreResult<Vec<String>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT items.id FROM items
             LEFT JOIN review_states
               ON review_states.item_id = items.id
              AND review_states.learner_id = ?1
             WHERE review_states.item_id IS NULL
             ORDER BY items.position ASC
             LIMIT ?2",
        )?;

        let ids = stmt
            .query_map(params![learner_id, limit as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn append_study_result(&self, result: &StudyResult) -> StoreResult<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO study_results (
                session_id, item_id, learner_id, was_correct,
                difficulty_rating, response_seconds, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.session_id,
                result.item_id,
                result.learner_id,
                result.was_correct,
                result.difficulty_rating,
                result.response_seconds,
                result.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn create_session(&self, session: &StudySession) -> StoreResult<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO study_sessions (
                id, learner_id, session_type, started_at, ended_at,
                items_studied, correct_count, average_response_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.learner_id,
                session.session_type.as_str(),
                session.started_at.to_rfc3339(),
                session.ended_at.map(|dt| dt.to_rfc3339()),
                session.items_studied,
                session.correct_count,
                session.average_response_seconds,
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> StoreResult<Option<StudySession>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare("SELECT * FROM study_sessions WHERE id = ?1")?;

        let session = stmt
            .query_row(params![session_id], |row| Self::row_to_session(row))
            .optional()?;
        Ok(session)
    }

    fn finalize_session(&self, session: &StudySession) -> StoreResult<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "UPDATE study_sessions SET
                ended_at = ?1,
                items_studied = ?2,
                correct_count = ?3,
                average_response_seconds = ?4
             WHERE id = ?5",
            params![
                session.ended_at.map(|dt| dt.to_rfc3339()),
                session.items_studied,
                session.correct_count,
                session.average_response_seconds,
                session.id,
            ],
        )?;
        Ok(())
    }

    fn results_for_session(&self, session_id: &str) -> StoreResult<Vec<StudyResult>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM study_results WHERE session_id = ?1 ORDER BY id ASC",
        )?;

        let results = stmt
            .query_map(params![session_id], |row| Self::row_to_result(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    fn completed_sessions(
        &self,
        learner_id: &str,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudySession>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM study_sessions
             WHERE learner_id = ?1
               AND ended_at IS NOT NULL
               AND (?2 IS NULL OR ended_at >= ?2)
               AND (?3 IS NULL OR ended_at <= ?3)
             ORDER BY ended_at ASC",
        )?;

        let sessions = stmt
            .query_map(
                params![
                    learner_id,
                    from.map(|dt| dt.to_rfc3339()),
                    until.map(|dt| dt.to_rfc3339()),
                ],
                |row| Self::row_to_session(row),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn results_for_learner(
        &self,
        learner_id: &str,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudyResult>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM study_results
             WHERE learner_id = ?1
               AND (?2 IS NULL OR recorded_at >= ?2)
               AND (?3 IS NULL OR recorded_at <= ?3)
             ORDER BY id ASC",
        )?;

        let results = stmt
            .query_map(
                params![
                    learner_id,
                    from.map(|dt| dt.to_rfc3339()),
                    until.map(|dt| dt.to_rfc3339()),
                ],
                |row| Self::row_to_result(row),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    fn review_states_for_learner(&self, learner_id: &str) -> StoreResult<Vec<ReviewState>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| StoreError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT * FROM review_states WHERE learner_id = ?1 ORDER BY item_id ASC",
        )?;

        let states = stmt
            .query_map(params![learner_id], |row| Self::row_to_state(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_with_items(n: i64) -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        for i in 0..n {
            store.add_item(&format!("item-{}", i), i).unwrap();
        }
        store
    }

    fn state(learner: &str, item: &str, due: DateTime<Utc>) -> ReviewState {
        ReviewState {
            learner_id: learner.into(),
            item_id: item.into(),
            next_due_at: due,
            interval_days: 1,
            repetition_number: 0,
            ease_factor: 2.5,
            consecutive_correct: 0,
            total_reviews: 1,
            last_studied_at: Some(due - Duration::days(1)),
        }
    }

    #[test]
    fn test_upsert_then_get_roundtrip() {
        let store = store_with_items(1);
        let now = Utc::now();
        let state = state("l1", "item-0", now);

        store.upsert_review_state(&state).unwrap();
        let loaded = store.get_review_state("l1", "item-0").unwrap().unwrap();
        assert_eq!(loaded.item_id, "item-0");
        assert_eq!(loaded.interval_days, 1);
        assert!((loaded.ease_factor - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_upsert_overwrites_existing_key() {
        let store = store_with_items(1);
        let now = Utc::now();
        let mut s = state("l1", "item-0", now);

        store.upsert_review_state(&s).unwrap();
        s.interval_days = 6;
        s.total_reviews = 2;
        store.upsert_review_state(&s).unwrap();

        let loaded = store.get_review_state("l1", "item-0").unwrap().unwrap();
        assert_eq!(loaded.interval_days, 6);
        assert_eq!(loaded.total_reviews, 2);
    }

    #[test]
    fn test_due_items_ordered_and_cutoff() {
        let store = store_with_items(3);
        let now = Utc::now();

        store
            .upsert_review_state(&state("l1", "item-0", now - Duration::days(1)))
            .unwrap();
        store
            .upsert_review_state(&state("l1", "item-1", now - Duration::days(3)))
            .unwrap();
        // Not yet due; must never appear
        store
            .upsert_review_state(&state("l1", "item-2", now + Duration::days(2)))
            .unwrap();

        let due = store.get_due_items("l1", now, 10).unwrap();
        let ids: Vec<_> = due.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, vec!["item-1", "item-0"]);
        assert!(due.iter().all(|s| s.next_due_at <= now));
    }

    #[test]
    fn test_due_items_respects_limit() {
        let store = store_with_items(5);
        let now = Utc::now();
        for i in 0..5 {
            store
                .upsert_review_state(&state(
                    "l1",
                    &format!("item-{}", i),
                    now - Duration::days(i + 1),
                ))
                .unwrap();
        }

        let due = store.get_due_items("l1", now, 2).unwrap();
        assert_eq!(due.len(), 2);
        // Most overdue first
        assert_eq!(due[0].item_id, "item-4");
    }

    #[test]
    fn test_unseen_items_in_canonical_order() {
        let store = store_with_items(4);
        let now = Utc::now();
        store
            .upsert_review_state(&state("l1", "item-1", now))
            .unwrap();

        let unseen = store.get_unseen_items("l1", 10).unwrap();
        assert_eq!(unseen, vec!["item-0", "item-2", "item-3"]);

        // A different learner has seen nothing
        let unseen = store.get_unseen_items("l2", 2).unwrap();
        assert_eq!(unseen, vec!["item-0", "item-1"]);
    }

    #[test]
    fn test_session_create_finalize_roundtrip() {
        let store = store_with_items(0);
        let now = Utc::now();
        let mut session = StudySession::start("l1", SessionType::Review, now);
        store.create_session(&session).unwrap();

        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert!(loaded.is_active());

        session.ended_at = Some(now + Duration::minutes(10));
        session.items_studied = 3;
        session.correct_count = 2;
        session.average_response_seconds = Some(4.5);
        store.finalize_session(&session).unwrap();

        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert!(!loaded.is_active());
        assert_eq!(loaded.items_studied, 3);
        assert_eq!(loaded.correct_count, 2);
        assert_eq!(loaded.average_response_seconds, Some(4.5));
    }

    #[test]
    fn test_completed_sessions_window() {
        let store = store_with_items(0);
        let now = Utc::now();

        for days_ago in [1i64, 3, 9] {
            let started = now - Duration::days(days_ago);
            let mut session = StudySession::start("l1", SessionType::Review, started);
            store.create_session(&session).unwrap();
            session.ended_at = Some(started + Duration::minutes(5));
            store.finalize_session(&session).unwrap();
        }
        // Active session must never count as completed
        let open = StudySession::start("l1", SessionType::Review, now);
        store.create_session(&open).unwrap();

        let all = store.completed_sessions("l1", None, None).unwrap();
        assert_eq!(all.len(), 3);

        let recent = store
            .completed_sessions("l1", Some(now - Duration::days(7)), None)
            .unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_results_append_only_in_order() {
        let store = store_with_items(1);
        let now = Utc::now();

        for (i, correct) in [true, false, true].iter().enumerate() {
            store
                .append_study_result(&StudyResult {
                    session_id: "s1".into(),
                    item_id: "item-0".into(),
                    learner_id: "l1".into(),
                    was_correct: *correct,
                    difficulty_rating: 3,
                    response_seconds: Some(i as f64),
                    recorded_at: now,
                })
                .unwrap();
        }

        let results = store.results_for_session("s1").unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].response_seconds, Some(0.0));
        assert_eq!(results[2].response_seconds, Some(2.0));

        let by_learner = store.results_for_learner("l1", None, None).unwrap();
        assert_eq!(by_learner.len(), 3);
    }
}

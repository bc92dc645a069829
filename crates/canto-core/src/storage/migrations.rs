//! Database Migrations
//!
//! Schema migration definitions for the SQLite store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: items, review states, sessions, results",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Covering indexes for due-queue and history scans",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
-- Item catalog: opaque ids plus the canonical ordering key used for
-- new-item selection
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL
);

-- Per-(learner, item) scheduling state, created lazily on first exposure
CREATE TABLE IF NOT EXISTS review_states (
    learner_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    next_due_at TEXT NOT NULL,
    interval_days INTEGER NOT NULL DEFAULT 1,
    repetition_number INTEGER NOT NULL DEFAULT 0,
    ease_factor REAL NOT NULL DEFAULT 2.5,
    consecutive_correct INTEGER NOT NULL DEFAULT 0,
    total_reviews INTEGER NOT NULL DEFAULT 0,
    last_studied_at TEXT,
    PRIMARY KEY (learner_id, item_id)
);

CREATE TABLE IF NOT EXISTS study_sessions (
    id TEXT PRIMARY KEY,
    learner_id TEXT NOT NULL,
    session_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    items_studied INTEGER NOT NULL DEFAULT 0,
    correct_count INTEGER NOT NULL DEFAULT 0,
    average_response_seconds REAL
);

-- Append-only result history (the audit trail; never mutated or deleted)
CREATE TABLE IF NOT EXISTS study_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    learner_id TEXT NOT NULL,
    was_correct INTEGER NOT NULL,
    difficulty_rating INTEGER NOT NULL,
    response_seconds REAL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);

INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Indexes for the hot queries
const MIGRATION_V2_UP: &str = r#"
CREATE INDEX IF NOT EXISTS idx_items_position ON items(position);
CREATE INDEX IF NOT EXISTS idx_states_due ON review_states(learner_id, next_due_at);
CREATE INDEX IF NOT EXISTS idx_sessions_learner_ended ON study_sessions(learner_id, ended_at);
CREATE INDEX IF NOT EXISTS idx_results_session ON study_results(session_id);
CREATE INDEX IF NOT EXISTS idx_results_learner_recorded ON study_results(learner_id, recorded_at);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

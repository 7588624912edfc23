//! SQLite schema for the scheduling store.
//!
//! Applied on first open and gated on `PRAGMA user_version`.

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Connection settings applied on every open
pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = FULL;
PRAGMA busy_timeout = 5000;
"#;

/// Version 1 tables; idempotent thanks to `IF NOT EXISTS`
pub const SCHEMA_V1: &str = r#"
-- One row per tracked note
CREATE TABLE IF NOT EXISTS schedules (
    note_path TEXT PRIMARY KEY,
    note_id TEXT NOT NULL,
    context TEXT NOT NULL,
    easiness REAL NOT NULL DEFAULT 2.5,
    consecutive_correct INTEGER NOT NULL DEFAULT 0,
    due_date TEXT NOT NULL,
    total_reviews INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_reviewed TEXT,
    archived INTEGER NOT NULL DEFAULT 0
);

-- Last observed corpus state, one row per context
CREATE TABLE IF NOT EXISTS cache_metadata (
    context TEXT PRIMARY KEY,
    last_sync TEXT,
    corpus_dir_mtime INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schedules_due_date ON schedules(due_date);
CREATE INDEX IF NOT EXISTS idx_schedules_context_due ON schedules(context, due_date);
"#;

/// Columns every supported `schedules` table must have
pub const SCHEDULE_COLUMNS: &[&str] = &[
    "note_path",
    "note_id",
    "context",
    "easiness",
    "consecutive_correct",
    "due_date",
    "total_reviews",
    "created_at",
    "last_reviewed",
    "archived",
];

/// Columns every supported `cache_metadata` table must have
pub const CACHE_COLUMNS: &[&str] = &["context", "last_sync", "corpus_dir_mtime"];

//! Storage operations for review schedules
//!
//! One SQLite file per context:
//! ```text
//! <corpus root or context dir>/.recall/
//! └── <context>/
//!     └── schedule.db
//!         ├── schedules        # one row per tracked note
//!         └── cache_metadata   # last observed corpus mtime
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;

use super::models::{InitialState, RemovalPolicy, ReviewStats, SchedulingRecord};
use super::schema::{CACHE_COLUMNS, PRAGMAS, SCHEDULE_COLUMNS, SCHEMA_V1, SCHEMA_VERSION};
use crate::corpus::NoteEntry;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Note not tracked: {0}")]
    NotFound(String),

    #[error("Note already tracked: {0}")]
    AlreadyExists(String),

    #[error("Invalid grade {0}, expected 0-5")]
    InvalidGrade(u8),
}

impl ScheduleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(err: rusqlite::Error) -> Self {
        let corrupt = matches!(
            &err,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
        );
        if corrupt {
            Self::Schema(err.to_string())
        } else {
            Self::Sqlite(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Cached mtime meaning "reconcile on next validation"
pub const INVALIDATED_MTIME: i64 = i64::MIN;

const RECORD_COLUMNS: &str = "note_path, note_id, context, easiness, consecutive_correct, \
     due_date, total_reviews, created_at, last_reviewed, archived";

/// Cache row for one context
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetadata {
    pub context: String,
    pub last_sync: Option<DateTime<Utc>>,
    /// Nanoseconds since the Unix epoch
    pub corpus_dir_mtime: i64,
}

/// Counts written by one reconciliation batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchCounts {
    pub adopted: usize,
    pub removed: usize,
    pub archived: usize,
    pub restored: usize,
}

/// SQLite-backed scheduling store.
///
/// Opened once per process and closed when dropped. Every write is a single
/// transaction with `synchronous = FULL`, so it is on disk when the call
/// returns.
pub struct ScheduleStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl ScheduleStore {
    /// Open (or create) the store file at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        store.conn.execute_batch(PRAGMAS)?;
        store.migrate()?;

        log::info!("Opened schedule store at {:?}", db_path);
        Ok(store)
    }

    /// Open a throwaway store that lives in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            db_path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Get the database path (`None` for in-memory stores).
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Create the schema if absent, then check the layout is one we understand.
    fn migrate(&self) -> Result<()> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(ScheduleError::Schema(format!(
                "store schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )));
        }

        if current < 1 {
            self.conn.execute_batch(SCHEMA_V1)?;
            self.conn.execute_batch("PRAGMA user_version = 1")?;
            log::info!("Initialized schedule store schema v{}", SCHEMA_VERSION);
        }

        self.verify_table("schedules", SCHEDULE_COLUMNS)?;
        self.verify_table("cache_metadata", CACHE_COLUMNS)?;
        Ok(())
    }

    fn verify_table(&self, table: &str, expected: &[&str]) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(ScheduleError::Schema(format!("missing table {}", table)));
        }

        for column in expected {
            if !columns.iter().any(|c| c == column) {
                return Err(ScheduleError::Schema(format!(
                    "table {} is missing column {}",
                    table, column
                )));
            }
        }
        Ok(())
    }

    // ==================== Record Operations ====================

    /// Get the record for a note
    pub fn get(&self, note_path: &str) -> Result<SchedulingRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM schedules WHERE note_path = ?1", RECORD_COLUMNS),
                params![note_path],
                record_from_row,
            )
            .optional()?
            .ok_or_else(|| ScheduleError::NotFound(note_path.to_string()))
    }

    /// Start tracking a note
    pub fn create(
        &self,
        note_path: &str,
        note_id: &str,
        context: &str,
        initial: &InitialState,
    ) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT INTO schedules (note_path, note_id, context, easiness, consecutive_correct, \
             due_date, total_reviews, created_at, last_reviewed, archived) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 0) \
             ON CONFLICT(note_path) DO NOTHING",
            params![
                note_path,
                note_id,
                context,
                initial.easiness,
                initial.consecutive_correct,
                encode_ts(&initial.due_date),
                initial.total_reviews,
                encode_ts(&initial.created_at),
            ],
        )?;

        if inserted == 0 {
            return Err(ScheduleError::AlreadyExists(note_path.to_string()));
        }
        Ok(())
    }

    /// Persist a review: overwrite the mutable fields and bump `total_reviews`.
    ///
    /// The counter is incremented from its stored value; `updated.total_reviews`
    /// is ignored.
    pub fn apply_review(&self, note_path: &str, updated: &SchedulingRecord) -> Result<()> {
        let reviewed_at = updated.last_reviewed.unwrap_or_else(Utc::now);
        let changed = self.conn.execute(
            "UPDATE schedules SET easiness = ?2, consecutive_correct = ?3, due_date = ?4, \
             total_reviews = total_reviews + 1, last_reviewed = ?5 \
             WHERE note_path = ?1",
            params![
                note_path,
                updated.easiness,
                updated.consecutive_correct,
                encode_ts(&updated.due_date),
                encode_ts(&reviewed_at),
            ],
        )?;

        if changed == 0 {
            return Err(ScheduleError::NotFound(note_path.to_string()));
        }
        Ok(())
    }

    /// Stop tracking a note. Removing an untracked note is not an error.
    pub fn delete(&self, note_path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM schedules WHERE note_path = ?1", params![note_path])?;
        Ok(())
    }

    /// Live records of a context due at or before `as_of`, oldest first
    pub fn due_items(&self, context: &str, as_of: DateTime<Utc>) -> Result<Vec<SchedulingRecord>> {
        self.query_records(
            &format!(
                "SELECT {} FROM schedules \
                 WHERE context = ?1 AND archived = 0 AND due_date <= ?2 \
                 ORDER BY due_date ASC, note_path ASC",
                RECORD_COLUMNS
            ),
            params![context, encode_ts(&as_of)],
        )
    }

    /// Every record of a context, archived ones included
    pub fn list(&self, context: &str) -> Result<Vec<SchedulingRecord>> {
        self.query_records(
            &format!(
                "SELECT {} FROM schedules WHERE context = ?1 ORDER BY note_path ASC",
                RECORD_COLUMNS
            ),
            params![context],
        )
    }

    /// Tracked paths of a context mapped to their archived flag
    pub fn tracked_paths(&self, context: &str) -> Result<HashMap<String, bool>> {
        let mut stmt = self
            .conn
            .prepare("SELECT note_path, archived FROM schedules WHERE context = ?1")?;
        let paths = stmt
            .query_map(params![context], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(paths)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SchedulingRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Aggregate numbers for a context; archived records only count as archived
    pub fn stats(&self, context: &str, as_of: DateTime<Utc>) -> Result<ReviewStats> {
        let (total, due, mean_easiness, mean_reviews): (i64, i64, f64, f64) = self.conn.query_row(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN due_date <= ?2 THEN 1 ELSE 0 END), 0), \
             COALESCE(AVG(easiness), 0.0), \
             COALESCE(AVG(total_reviews), 0.0) \
             FROM schedules WHERE context = ?1 AND archived = 0",
            params![context, encode_ts(&as_of)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let archived: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM schedules WHERE context = ?1 AND archived = 1",
            params![context],
            |row| row.get(0),
        )?;

        Ok(ReviewStats {
            total: total as usize,
            due: due as usize,
            archived: archived as usize,
            mean_easiness,
            mean_reviews,
        })
    }

    /// Apply one reconciliation pass in a single transaction.
    ///
    /// `adopt` notes get the default initial state at `now`; `missing` notes
    /// are deleted or archived depending on `policy`; `restore` notes are
    /// un-archived.
    pub fn reconcile(
        &mut self,
        context: &str,
        adopt: &[NoteEntry],
        missing: &[String],
        restore: &[String],
        policy: RemovalPolicy,
        now: DateTime<Utc>,
    ) -> Result<BatchCounts> {
        let initial = InitialState::at(now);
        let mut counts = BatchCounts::default();
        let tx = self.conn.transaction()?;

        for entry in adopt {
            counts.adopted += tx.execute(
                "INSERT INTO schedules (note_path, note_id, context, easiness, consecutive_correct, \
                 due_date, total_reviews, created_at, last_reviewed, archived) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 0) \
                 ON CONFLICT(note_path) DO NOTHING",
                params![
                    entry.path,
                    entry.note_id,
                    context,
                    initial.easiness,
                    initial.consecutive_correct,
                    encode_ts(&initial.due_date),
                    initial.total_reviews,
                    encode_ts(&initial.created_at),
                ],
            )?;
        }

        for path in missing {
            match policy {
                RemovalPolicy::Tombstone => {
                    counts.removed += tx.execute(
                        "DELETE FROM schedules WHERE note_path = ?1 AND context = ?2",
                        params![path, context],
                    )?;
                }
                RemovalPolicy::Archive => {
                    counts.archived += tx.execute(
                        "UPDATE schedules SET archived = 1 \
                         WHERE note_path = ?1 AND context = ?2 AND archived = 0",
                        params![path, context],
                    )?;
                }
            }
        }

        for path in restore {
            counts.restored += tx.execute(
                "UPDATE schedules SET archived = 0 \
                 WHERE note_path = ?1 AND context = ?2 AND archived = 1",
                params![path, context],
            )?;
        }

        tx.commit()?;
        Ok(counts)
    }

    // ==================== Cache Metadata ====================

    /// Cache row for a context, `None` if never synced
    pub fn cache_metadata(&self, context: &str) -> Result<Option<CacheMetadata>> {
        let row = self
            .conn
            .query_row(
                "SELECT context, last_sync, corpus_dir_mtime FROM cache_metadata WHERE context = ?1",
                params![context],
                |row| {
                    let last_sync: Option<String> = row.get(1)?;
                    Ok(CacheMetadata {
                        context: row.get(0)?,
                        last_sync: last_sync.as_deref().map(|s| decode_ts(s, 1)).transpose()?,
                        corpus_dir_mtime: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Record a completed reconciliation
    pub fn record_sync(&self, context: &str, corpus_dir_mtime: i64, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cache_metadata (context, last_sync, corpus_dir_mtime) VALUES (?1, ?2, ?3) \
             ON CONFLICT(context) DO UPDATE SET \
             last_sync = excluded.last_sync, corpus_dir_mtime = excluded.corpus_dir_mtime",
            params![context, encode_ts(&now), corpus_dir_mtime],
        )?;
        Ok(())
    }

    /// Force the next validation to reconcile; keeps `last_sync`
    pub fn invalidate(&self, context: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cache_metadata (context, last_sync, corpus_dir_mtime) VALUES (?1, NULL, ?2) \
             ON CONFLICT(context) DO UPDATE SET corpus_dir_mtime = excluded.corpus_dir_mtime",
            params![context, INVALIDATED_MTIME],
        )?;
        Ok(())
    }
}

/// Fixed-width RFC 3339 so text order matches time order
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_ts(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn record_from_row(row: &Row) -> rusqlite::Result<SchedulingRecord> {
    let due_date: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let last_reviewed: Option<String> = row.get(8)?;

    Ok(SchedulingRecord {
        note_path: row.get(0)?,
        note_id: row.get(1)?,
        context: row.get(2)?,
        easiness: row.get(3)?,
        consecutive_correct: row.get(4)?,
        due_date: decode_ts(&due_date, 5)?,
        total_reviews: row.get(6)?,
        created_at: decode_ts(&created_at, 7)?,
        last_reviewed: last_reviewed.as_deref().map(|s| decode_ts(s, 8)).transpose()?,
        archived: row.get(9)?,
    })
}

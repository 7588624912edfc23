//! Data models for the review scheduler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor assigned to a newly tracked note
pub const DEFAULT_EASINESS: f64 = 2.5;

/// Minimum ease factor allowed
pub const MIN_EASINESS: f64 = 1.3;

/// Review state for one tracked note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingRecord {
    /// Corpus-relative path, `/`-separated. Unique key.
    pub note_path: String,
    /// Short identifier handed out by the note tool (informational)
    pub note_id: String,
    /// Workspace the note belongs to
    pub context: String,
    /// SM-2 ease factor, never below [`MIN_EASINESS`]
    pub easiness: f64,
    /// Successful reviews in a row
    pub consecutive_correct: u32,
    /// When the note should be reviewed next
    pub due_date: DateTime<Utc>,
    /// Number of reviews ever recorded
    pub total_reviews: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Set when the note vanished from the corpus under the archive policy
    #[serde(default)]
    pub archived: bool,
}

impl SchedulingRecord {
    /// Build a record from its initial state
    pub fn new(note_path: String, note_id: String, context: String, initial: &InitialState) -> Self {
        Self {
            note_path,
            note_id,
            context,
            easiness: initial.easiness,
            consecutive_correct: initial.consecutive_correct,
            due_date: initial.due_date,
            total_reviews: initial.total_reviews,
            created_at: initial.created_at,
            last_reviewed: None,
            archived: false,
        }
    }

    /// Check if the note is due at `as_of`
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        !self.archived && self.due_date <= as_of
    }
}

/// Starting state for a note that is tracked for the first time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub easiness: f64,
    pub consecutive_correct: u32,
    pub total_reviews: u32,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InitialState {
    /// Fresh note: default ease, no streak, no reviews, due immediately.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            easiness: DEFAULT_EASINESS,
            consecutive_correct: 0,
            total_reviews: 0,
            due_date: now,
            created_at: now,
        }
    }
}

/// What happens to a record whose note disappeared from the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the record; a note re-added at the same path starts fresh
    #[default]
    Tombstone,
    /// Keep the record but hide it until the note comes back
    Archive,
}

/// A due record with the fields derived for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueItem {
    pub record: SchedulingRecord,
    /// Due more than a day before the end of today
    pub overdue: bool,
    /// Whole days elapsed since the due date, zero when not yet past
    pub days_past: u32,
}

/// Aggregate numbers for one context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: usize,
    pub due: usize,
    pub archived: usize,
    pub mean_easiness: f64,
    pub mean_reviews: f64,
}

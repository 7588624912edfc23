//! Spaced repetition scheduling for notes
//!
//! This module provides:
//! - The persistent scheduling store (SQLite)
//! - SM-2 review updates
//! - The due-today query

pub mod algorithm;
pub mod due;
mod models;
mod schema;
mod storage;

pub use algorithm::{next_state, Grade};
pub use due::{due_today, end_of_day};
pub use models::*;
pub use schema::SCHEMA_VERSION;
pub use storage::{
    BatchCounts, CacheMetadata, ScheduleError, ScheduleStore, INVALIDATED_MTIME,
};

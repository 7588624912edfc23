//! SM-2 Spaced Repetition Algorithm
//!
//! Two-factor interval growth: an ease factor that drifts with each grade
//! and a streak of successful reviews that picks the next interval.
//!
//! Grades (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing the note, remembered
//! - 2: Incorrect, but the note seemed easy to recall
//! - 3: Correct recall with serious difficulty
//! - 4: Correct recall after hesitation
//! - 5: Perfect recall with no hesitation

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::models::{SchedulingRecord, MIN_EASINESS};
use super::storage::ScheduleError;

/// Lowest grade that counts as a successful review
const PASSING_GRADE: u8 = 3;

/// Interval after the second successful review in a row
const SECOND_INTERVAL_DAYS: i64 = 6;

/// Upper bound on any interval, keeps date arithmetic in range
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

/// A review grade in `0..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_GRADE
    }

    /// Every valid grade, lowest first
    pub fn all() -> impl Iterator<Item = Grade> {
        (0..=Self::MAX).map(Grade)
    }
}

impl TryFrom<u8> for Grade {
    type Error = ScheduleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Grade::new(value).ok_or(ScheduleError::InvalidGrade(value))
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ease factor, streak and interval (days) a grade would produce
struct Step {
    easiness: f64,
    consecutive_correct: u32,
    interval_days: i64,
}

fn step(prior: &SchedulingRecord, grade: Grade) -> Step {
    // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
    let lapse = f64::from(Grade::MAX - grade.value());
    let easiness = (prior.easiness + (0.1 - lapse * (0.08 + lapse * 0.02))).max(MIN_EASINESS);

    if !grade.is_passing() {
        return Step {
            easiness,
            consecutive_correct: 0,
            interval_days: 1,
        };
    }

    let consecutive_correct = prior.consecutive_correct.saturating_add(1);
    let interval_days = match consecutive_correct {
        1 => 1,
        2 => SECOND_INTERVAL_DAYS,
        _ => ((prior_interval_days(prior) * easiness).round() as i64).clamp(1, MAX_INTERVAL_DAYS),
    };

    Step {
        easiness,
        consecutive_correct,
        interval_days,
    }
}

/// Interval the prior review scheduled, in days.
///
/// Reconstructed as `due_date - last_reviewed`; one day when the note has
/// never been reviewed or the stored dates are inconsistent.
fn prior_interval_days(prior: &SchedulingRecord) -> f64 {
    match prior.last_reviewed {
        Some(last) if prior.due_date > last => {
            (prior.due_date - last).num_seconds() as f64 / 86_400.0
        }
        _ => 1.0,
    }
}

/// Calculate the state after reviewing `prior` with `grade` at `now`.
///
/// Pure: persisting the result is up to the caller. `total_reviews` is the
/// projected counter; the store increments its own copy.
pub fn next_state(prior: &SchedulingRecord, grade: Grade, now: DateTime<Utc>) -> SchedulingRecord {
    let Step {
        easiness,
        consecutive_correct,
        interval_days,
    } = step(prior, grade);

    SchedulingRecord {
        easiness,
        consecutive_correct,
        due_date: now + Duration::days(interval_days),
        total_reviews: prior.total_reviews.saturating_add(1),
        last_reviewed: Some(now),
        ..prior.clone()
    }
}

/// Interval in days each grade 0-5 would give, indexed by grade
pub fn preview_intervals(prior: &SchedulingRecord) -> [i64; 6] {
    let mut intervals = [0; 6];
    for grade in Grade::all() {
        intervals[usize::from(grade.value())] = step(prior, grade).interval_days;
    }
    intervals
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: i64) -> String {
    if days <= 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::models::InitialState;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_record() -> SchedulingRecord {
        SchedulingRecord::new(
            "notes/a1b2.md".to_string(),
            "a1b2".to_string(),
            "default".to_string(),
            &InitialState::at(t0()),
        )
    }

    fn grade(value: u8) -> Grade {
        Grade::new(value).unwrap()
    }

    #[test]
    fn test_first_review_perfect() {
        let next = next_state(&new_record(), grade(5), t0());

        assert_eq!(next.consecutive_correct, 1);
        assert_eq!(next.due_date, t0() + Duration::days(1));
        assert_eq!(next.total_reviews, 1);
        assert!((next.easiness - 2.6).abs() < 1e-9);
        assert_eq!(next.last_reviewed, Some(t0()));
    }

    #[test]
    fn test_second_review_uses_six_days() {
        let first = next_state(&new_record(), grade(5), t0());
        let review_time = t0() + Duration::days(1);
        let second = next_state(&first, grade(5), review_time);

        assert_eq!(second.consecutive_correct, 2);
        assert_eq!(second.due_date, review_time + Duration::days(6));
        assert_eq!(second.total_reviews, 2);
    }

    #[test]
    fn test_subsequent_review_multiplies_prior_interval() {
        let mut record = new_record();
        record.consecutive_correct = 2;
        record.easiness = 2.5;
        record.last_reviewed = Some(t0());
        record.due_date = t0() + Duration::days(10);

        let now = t0() + Duration::days(10);
        let next = next_state(&record, grade(4), now);

        // grade 4 leaves the ease factor at 2.5; 10 * 2.5 = 25
        assert!((next.easiness - 2.5).abs() < 1e-9);
        assert_eq!(next.consecutive_correct, 3);
        assert_eq!(next.due_date, now + Duration::days(25));
    }

    #[test]
    fn test_missing_last_review_defaults_to_one_day() {
        let mut record = new_record();
        record.consecutive_correct = 4;
        record.easiness = 2.0;

        let next = next_state(&record, grade(4), t0());
        assert_eq!(next.due_date, t0() + Duration::days(2));
    }

    #[test]
    fn test_failing_grade_resets_streak() {
        let mut record = new_record();
        record.consecutive_correct = 3;
        record.easiness = 2.9;
        record.last_reviewed = Some(t0());
        record.due_date = t0() + Duration::days(40);

        let now = t0() + Duration::days(41);
        let next = next_state(&record, grade(1), now);

        assert_eq!(next.consecutive_correct, 0);
        assert_eq!(next.due_date, now + Duration::days(1));
        assert_eq!(next.total_reviews, 1);
    }

    #[test]
    fn test_easiness_floor_holds_for_every_grade() {
        for g in Grade::all() {
            let mut record = new_record();
            let mut now = t0();
            for _ in 0..30 {
                record = next_state(&record, g, now);
                assert!(record.easiness >= MIN_EASINESS, "grade {} fell below floor", g);
                now = record.due_date;
            }
        }
    }

    #[test]
    fn test_blackouts_pin_easiness_to_floor() {
        let mut record = new_record();
        for _ in 0..20 {
            record = next_state(&record, grade(0), t0());
        }
        assert!((record.easiness - MIN_EASINESS).abs() < 1e-9);
        assert_eq!(record.total_reviews, 20);
    }

    #[test]
    fn test_next_state_does_not_touch_identity() {
        let record = new_record();
        let next = next_state(&record, grade(3), t0());
        assert_eq!(next.note_path, record.note_path);
        assert_eq!(next.note_id, record.note_id);
        assert_eq!(next.context, record.context);
        assert_eq!(next.created_at, record.created_at);
    }

    #[test]
    fn test_grade_validation() {
        assert!(Grade::new(5).is_some());
        assert!(Grade::new(6).is_none());
        assert!(matches!(Grade::try_from(9), Err(ScheduleError::InvalidGrade(9))));
        assert!(!grade(2).is_passing());
        assert!(grade(3).is_passing());
    }

    #[test]
    fn test_interval_is_capped() {
        let mut record = new_record();
        record.consecutive_correct = 10;
        record.easiness = 3.0;
        record.last_reviewed = Some(t0());
        record.due_date = t0() + Duration::days(30_000);

        let now = record.due_date;
        let next = next_state(&record, grade(5), now);
        assert_eq!(next.due_date, now + Duration::days(MAX_INTERVAL_DAYS));
    }

    #[test]
    fn test_preview_intervals() {
        let mut record = new_record();
        record.consecutive_correct = 1;
        let preview = preview_intervals(&record);
        assert_eq!(preview, [1, 1, 1, 6, 6, 6]);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(5), "5d");
        assert_eq!(format_interval(7), "1w");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(30), "1mo");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(365), "1y");
        assert_eq!(format_interval(730), "2y");
    }
}

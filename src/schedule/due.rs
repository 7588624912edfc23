//! Due-today query and ranking

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

use super::models::DueItem;
use super::storage::{Result, ScheduleStore};

/// First instant of the calendar day after `now`, in `now`'s time zone.
///
/// Anything due strictly before this instant is due today.
pub fn end_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let tomorrow = now.date_naive() + Duration::days(1);
    let midnight = tomorrow.and_time(NaiveTime::MIN);

    match tz.from_local_datetime(&midnight).earliest() {
        Some(instant) => instant.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day ends an hour later
        None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(1)),
    }
}

/// Notes of `context` due today or earlier.
///
/// Ordered by due date, then note path. `limit` is applied after sorting so
/// the first items are always the most overdue.
pub fn due_today<Tz: TimeZone>(
    store: &ScheduleStore,
    context: &str,
    now: &DateTime<Tz>,
    limit: Option<usize>,
) -> Result<Vec<DueItem>> {
    let end = end_of_day(now);
    let now_utc = now.with_timezone(&Utc);

    // The store bound is inclusive; the day boundary is not.
    let mut records = store.due_items(context, end)?;
    records.retain(|r| r.due_date < end);
    records.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.note_path.cmp(&b.note_path))
    });

    if let Some(limit) = limit {
        records.truncate(limit);
    }

    let overdue_before = end - Duration::hours(24);
    Ok(records
        .into_iter()
        .map(|record| {
            let days_past = (now_utc - record.due_date).num_days().max(0);
            DueItem {
                overdue: record.due_date < overdue_before,
                days_past: u32::try_from(days_past).unwrap_or(u32::MAX),
                record,
            }
        })
        .collect())
}

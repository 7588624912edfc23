//! Review scheduling for one context.
//!
//! A [`Scheduler`] owns the store handle, the cache manager and the note
//! source for a single context. Every read or mutation first makes sure
//! the store agrees with the corpus.

use std::path::Path;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use glob::Pattern;
use thiserror::Error;

use crate::cache::{CacheError, CacheManager, CacheState, DirMtimeProbe, Validation};
use crate::config::{Config, ConfigError};
use crate::corpus::{
    normalize_note_path, note_id_for, resolve_store_dir, CommandCorpus, CorpusError,
    DirectoryCorpus, NoteSource, StoreLayout,
};
use crate::schedule::{
    algorithm, due_today, end_of_day, next_state, DueItem, Grade, InitialState, ReviewStats,
    ScheduleError, ScheduleStore, SchedulingRecord,
};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a trackable note: {0}")]
    NotTrackable(String),
}

impl SchedulerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Schedule(e) if e.is_not_found())
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Schedule(e) if e.is_already_exists())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

pub struct Scheduler {
    store: ScheduleStore,
    cache: CacheManager<DirMtimeProbe>,
    source: Box<dyn NoteSource>,
    layout: StoreLayout,
    patterns: Vec<Pattern>,
    default_limit: Option<usize>,
}

impl Scheduler {
    /// Open the store for `context_dir`, creating it on first use.
    ///
    /// `context` defaults to the name of the corpus directory.
    pub fn open(context_dir: &Path, context: Option<&str>, config: &Config) -> Result<Self> {
        config.validate()?;

        let layout = resolve_store_dir(context_dir, &config.sentinel_dir, &config.store_dir)?;
        let context = context
            .map(str::to_string)
            .unwrap_or_else(|| default_context_name(&layout.corpus_dir));
        let store = ScheduleStore::open(&layout.db_path(&context, &config.store_file))?;

        let source: Box<dyn NoteSource> = match &config.list_command {
            Some(argv) => Box::new(CommandCorpus::new(layout.corpus_dir.clone(), argv.clone())),
            None => Box::new(DirectoryCorpus::new(
                layout.corpus_dir.clone(),
                &config.note_patterns,
                vec![config.sentinel_dir.clone(), config.store_dir.clone()],
            )?),
        };

        // Only consulted for explicit registration when the corpus is walked.
        let patterns: Vec<Pattern> = if config.list_command.is_some() {
            Vec::new()
        } else {
            config
                .note_patterns
                .iter()
                .map(|p| Pattern::new(p).map_err(CorpusError::from))
                .collect::<std::result::Result<_, _>>()?
        };

        let probe = DirMtimeProbe::new(layout.corpus_dir.clone());
        let cache = CacheManager::new(context.clone(), probe, config.removal_policy);

        log::info!("Scheduler for context '{}' at {:?}", context, layout.corpus_dir);

        Ok(Self {
            store,
            cache,
            source,
            layout,
            patterns,
            default_limit: config.default_limit,
        })
    }

    pub fn context(&self) -> &str {
        self.cache.context()
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.store.db_path()
    }

    pub fn cache_state(&self) -> Result<CacheState> {
        Ok(self.cache.state(&self.store)?)
    }

    /// Reconcile if the corpus changed, or unconditionally with `force`
    pub fn validate_and_refresh(&mut self, force: bool) -> Result<Validation> {
        if force {
            let report = self.cache.refresh(&mut self.store, self.source.as_ref())?;
            return Ok(Validation::Reconciled(report));
        }
        Ok(self.cache.validate(&mut self.store, self.source.as_ref())?)
    }

    /// Force the next validation to rescan the corpus
    pub fn invalidate(&self) -> Result<()> {
        Ok(self.cache.invalidate(&self.store)?)
    }

    /// Start tracking a note right after it was created.
    ///
    /// Fails with `AlreadyExists` if the note is tracked already.
    pub fn register_note(&self, path: &Path) -> Result<SchedulingRecord> {
        self.register_note_at(path, Utc::now())
    }

    pub fn register_note_at(&self, path: &Path, now: DateTime<Utc>) -> Result<SchedulingRecord> {
        let key = self.note_key(path)?;

        if !self.layout.corpus_dir.join(&key).is_file() {
            return Err(ScheduleError::NotFound(key).into());
        }
        if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.matches(&key)) {
            return Err(SchedulerError::NotTrackable(key));
        }

        let note_id = note_id_for(&key);
        self.store
            .create(&key, &note_id, self.context(), &InitialState::at(now))?;
        log::info!("Registered {} in '{}'", key, self.context());

        Ok(self.store.get(&key)?)
    }

    /// Grade a review of `path` and persist the next schedule
    pub fn record_review(&mut self, path: &Path, grade: Grade) -> Result<SchedulingRecord> {
        self.record_review_at(path, grade, Utc::now())
    }

    pub fn record_review_at(
        &mut self,
        path: &Path,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<SchedulingRecord> {
        self.validate_and_refresh(false)?;

        let key = self.note_key(path)?;
        let prior = self.tracked(&key)?;

        let updated = next_state(&prior, grade, now);
        self.store.apply_review(&key, &updated)?;
        log::debug!(
            "Reviewed {} with grade {}: next due {}",
            key,
            grade,
            updated.due_date
        );

        Ok(self.store.get(&key)?)
    }

    /// Notes due by the end of today, most overdue first
    pub fn list_due(&mut self, limit: Option<usize>) -> Result<Vec<DueItem>> {
        self.list_due_at(limit, &Local::now())
    }

    pub fn list_due_at<Tz: TimeZone>(
        &mut self,
        limit: Option<usize>,
        now: &DateTime<Tz>,
    ) -> Result<Vec<DueItem>> {
        self.validate_and_refresh(false)?;
        Ok(due_today(
            &self.store,
            self.context(),
            now,
            limit.or(self.default_limit),
        )?)
    }

    pub fn stats(&mut self) -> Result<ReviewStats> {
        self.stats_at(&Local::now())
    }

    /// Counts as of `now`; `due` matches what [`Scheduler::list_due_at`] returns
    pub fn stats_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<ReviewStats> {
        self.validate_and_refresh(false)?;
        let as_of = end_of_day(now) - Duration::nanoseconds(1);
        Ok(self.store.stats(self.context(), as_of)?)
    }

    /// The record of `path` with the interval each grade would give
    pub fn preview(&mut self, path: &Path) -> Result<(SchedulingRecord, [i64; 6])> {
        self.validate_and_refresh(false)?;
        let record = self.tracked(&self.note_key(path)?)?;
        let intervals = algorithm::preview_intervals(&record);
        Ok((record, intervals))
    }

    /// Every record of the context, archived ones included
    pub fn records(&self) -> Result<Vec<SchedulingRecord>> {
        Ok(self.store.list(self.context())?)
    }

    /// Live record of `key` in this context; archived notes count as absent
    fn tracked(&self, key: &str) -> Result<SchedulingRecord> {
        let record = self.store.get(key)?;
        if record.archived || record.context != self.context() {
            return Err(ScheduleError::NotFound(key.to_string()).into());
        }
        Ok(record)
    }

    fn note_key(&self, path: &Path) -> Result<String> {
        normalize_note_path(&self.layout.corpus_dir, &self.layout.context_dir, path)
            .ok_or_else(|| ScheduleError::NotFound(path.display().to_string()).into())
    }
}

fn default_context_name(corpus_dir: &Path) -> String {
    corpus_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration as StdDuration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn vault() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap().join("garden");
        fs::create_dir_all(root.join(".zk")).unwrap();
        (temp_dir, root)
    }

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# note\n").unwrap();
    }

    fn pin_mtime(dir: &Path, secs: u64) {
        fs::File::open(dir)
            .unwrap()
            .set_modified(UNIX_EPOCH + StdDuration::from_secs(secs))
            .unwrap();
    }

    fn grade(value: u8) -> Grade {
        Grade::new(value).unwrap()
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_open_places_store_beside_sentinel() {
        let (_temp_dir, root) = vault();
        let nested = root.join("daily");
        fs::create_dir_all(&nested).unwrap();

        let scheduler = Scheduler::open(&nested, None, &Config::default()).unwrap();
        assert_eq!(scheduler.context(), "garden");
        assert_eq!(scheduler.layout().corpus_dir, root);
        assert_eq!(
            scheduler.db_path().unwrap(),
            root.join(".recall").join("garden").join("schedule.db")
        );
    }

    #[test]
    fn test_contexts_on_one_corpus_are_independent() {
        let (_temp_dir, root) = vault();
        write(&root, "a.md");
        write(&root, "b.md");
        let now = Utc::now();

        let mut work = Scheduler::open(&root, Some("work"), &Config::default()).unwrap();
        assert_eq!(work.list_due_at(None, &now).unwrap().len(), 2);
        work.record_review_at(Path::new("a.md"), grade(5), noon(1))
            .unwrap();

        let mut home = Scheduler::open(&root, Some("home"), &Config::default()).unwrap();
        assert_ne!(home.db_path(), work.db_path());

        let validation = home.validate_and_refresh(false).unwrap();
        assert_eq!(
            validation,
            Validation::Reconciled(crate::cache::ReconcileReport {
                scanned: 2,
                adopted: 2,
                ..Default::default()
            })
        );
        assert_eq!(home.list_due_at(None, &now).unwrap().len(), 2);

        let reviewed = home
            .record_review_at(Path::new("a.md"), grade(3), noon(2))
            .unwrap();
        assert_eq!(reviewed.context, "home");
        assert_eq!(reviewed.total_reviews, 1);
        assert_eq!(reviewed.due_date, noon(3));

        // the work schedule is untouched by reviews in home
        let work_a = work
            .records()
            .unwrap()
            .into_iter()
            .find(|r| r.note_path == "a.md")
            .unwrap();
        assert_eq!(work_a.total_reviews, 1);
        assert_eq!(work_a.due_date, noon(2));

        write(&root, "c.md");
        assert!(work.register_note_at(Path::new("c.md"), now).is_ok());
        assert!(home.register_note_at(Path::new("c.md"), now).is_ok());
    }

    #[test]
    fn test_invalidate_forces_rescan() {
        let (_temp_dir, root) = vault();
        write(&root, "a.md");
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        scheduler.validate_and_refresh(false).unwrap();
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Valid);

        scheduler.invalidate().unwrap();
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Stale);
        assert!(scheduler.validate_and_refresh(false).unwrap().reconciled());
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Valid);
    }

    #[test]
    fn test_first_use_adopts_corpus() {
        let (_temp_dir, root) = vault();
        write(&root, "a1.md");
        write(&root, "topics/b2.md");
        write(&root, "topics/scan.pdf");

        let mut scheduler = Scheduler::open(&root, Some("work"), &Config::default()).unwrap();
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Unknown);

        let now = Utc::now();
        let due = scheduler.list_due_at(None, &now).unwrap();
        let paths: Vec<&str> = due.iter().map(|d| d.record.note_path.as_str()).collect();
        assert_eq!(paths, vec!["a1.md", "topics/b2.md"]);
        assert!(due.iter().all(|d| d.record.context == "work"));
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Valid);
    }

    #[test]
    fn test_validate_twice_reconciles_once() {
        let (_temp_dir, root) = vault();
        write(&root, "a1.md");
        pin_mtime(&root, 1_800_000_000);

        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        assert!(scheduler.validate_and_refresh(false).unwrap().reconciled());
        assert_eq!(scheduler.validate_and_refresh(false).unwrap(), Validation::Valid);

        // forced refresh always rescans
        assert!(scheduler.validate_and_refresh(true).unwrap().reconciled());
    }

    #[test]
    fn test_register_note() {
        let (_temp_dir, root) = vault();
        let scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();

        write(&root, "ideas/q7.md");
        let now = noon(1);
        let record = scheduler
            .register_note_at(Path::new("ideas/q7.md"), now)
            .unwrap();
        assert_eq!(record.note_path, "ideas/q7.md");
        assert_eq!(record.note_id, "q7");
        assert_eq!(record.due_date, now);
        assert_eq!(record.total_reviews, 0);

        let again = scheduler.register_note_at(&root.join("ideas/q7.md"), now);
        assert!(again.unwrap_err().is_already_exists());

        let missing = scheduler.register_note_at(Path::new("ideas/none.md"), now);
        assert!(missing.unwrap_err().is_not_found());

        let outside = scheduler.register_note_at(Path::new("/elsewhere/x.md"), now);
        assert!(outside.unwrap_err().is_not_found());

        write(&root, "ideas/sketch.png");
        let result = scheduler.register_note_at(Path::new("ideas/sketch.png"), now);
        assert!(matches!(result, Err(SchedulerError::NotTrackable(_))));
    }

    #[test]
    fn test_review_cycle() {
        let (_temp_dir, root) = vault();
        write(&root, "c3.md");
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        scheduler.validate_and_refresh(true).unwrap();

        let first = scheduler
            .record_review_at(Path::new("c3.md"), grade(5), noon(1))
            .unwrap();
        assert_eq!(first.consecutive_correct, 1);
        assert_eq!(first.total_reviews, 1);
        assert_eq!(first.due_date, noon(2));
        assert!((first.easiness - 2.6).abs() < 1e-9);

        let second = scheduler
            .record_review_at(Path::new("c3.md"), grade(5), noon(2))
            .unwrap();
        assert_eq!(second.due_date, noon(8));
        assert_eq!(second.total_reviews, 2);

        let failed = scheduler
            .record_review_at(Path::new("c3.md"), grade(1), noon(8))
            .unwrap();
        assert_eq!(failed.consecutive_correct, 0);
        assert_eq!(failed.due_date, noon(9));
        assert_eq!(failed.total_reviews, 3);
        assert_eq!(failed.last_reviewed, Some(noon(8)));
    }

    #[test]
    fn test_review_untracked_is_not_found() {
        let (_temp_dir, root) = vault();
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        let result = scheduler.record_review_at(Path::new("ghost.md"), grade(4), noon(1));
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_due_list_excludes_future_and_limits() {
        let (_temp_dir, root) = vault();
        for name in ["a.md", "b.md", "c.md"] {
            write(&root, name);
        }
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        scheduler.validate_and_refresh(true).unwrap();

        // b moves a day into the future from its review
        let now = Utc::now();
        scheduler.record_review_at(Path::new("b.md"), grade(5), now).unwrap();

        let due = scheduler.list_due_at(None, &now).unwrap();
        let paths: Vec<&str> = due.iter().map(|d| d.record.note_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "c.md"]);

        let limited = scheduler.list_due_at(Some(1), &now).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].record.note_path, "a.md");

        let stats = scheduler.stats_at(&now).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.due, 2);
    }

    #[test]
    fn test_default_limit_from_config() {
        let (_temp_dir, root) = vault();
        for name in ["a.md", "b.md", "c.md"] {
            write(&root, name);
        }
        let config = Config {
            default_limit: Some(2),
            ..Config::default()
        };
        let mut scheduler = Scheduler::open(&root, None, &config).unwrap();

        let now = Utc::now();
        assert_eq!(scheduler.list_due_at(None, &now).unwrap().len(), 2);
        assert_eq!(scheduler.list_due_at(Some(3), &now).unwrap().len(), 3);
    }

    #[test]
    fn test_external_delete_removes_schedule() {
        let (_temp_dir, root) = vault();
        write(&root, "keep.md");
        write(&root, "drop.md");
        pin_mtime(&root, 1_800_000_000);

        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        let now = Utc::now();
        assert_eq!(scheduler.list_due_at(None, &now).unwrap().len(), 2);

        fs::remove_file(root.join("drop.md")).unwrap();
        pin_mtime(&root, 1_800_000_100);

        let due = scheduler.list_due_at(None, &now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].record.note_path, "keep.md");
        assert_eq!(scheduler.records().unwrap().len(), 1);
    }

    #[test]
    fn test_archive_policy_keeps_schedule() {
        let (_temp_dir, root) = vault();
        write(&root, "keep.md");
        write(&root, "away.md");
        pin_mtime(&root, 1_800_000_000);

        let config = Config {
            removal_policy: crate::schedule::RemovalPolicy::Archive,
            ..Config::default()
        };
        let mut scheduler = Scheduler::open(&root, None, &config).unwrap();
        scheduler.validate_and_refresh(false).unwrap();
        scheduler
            .record_review_at(Path::new("away.md"), grade(4), noon(1))
            .unwrap();

        fs::rename(root.join("away.md"), root.join("../away.md")).unwrap();
        pin_mtime(&root, 1_800_000_100);

        let now = Utc::now();
        let due = scheduler.list_due_at(None, &now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(scheduler.stats_at(&now).unwrap().archived, 1);

        let review = scheduler.record_review_at(Path::new("away.md"), grade(4), noon(2));
        assert!(review.unwrap_err().is_not_found());

        fs::rename(root.join("../away.md"), root.join("away.md")).unwrap();
        pin_mtime(&root, 1_800_000_200);

        scheduler.validate_and_refresh(false).unwrap();
        let records = scheduler.records().unwrap();
        let back = records.iter().find(|r| r.note_path == "away.md").unwrap();
        assert!(!back.archived);
        assert_eq!(back.total_reviews, 1);
    }

    #[test]
    fn test_preview() {
        let (_temp_dir, root) = vault();
        write(&root, "p.md");
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();

        let (record, intervals) = scheduler.preview(Path::new("p.md")).unwrap();
        assert_eq!(record.note_path, "p.md");
        assert_eq!(intervals, [1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_due_query_uses_local_day() {
        let (_temp_dir, root) = vault();
        write(&root, "late.md");
        let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        scheduler.validate_and_refresh(true).unwrap();

        // reviewed at 10:00 UTC, due again at 10:00 UTC the next day
        let reviewed = Utc.with_ymd_and_hms(2026, 5, 10, 10, 0, 0).unwrap();
        scheduler
            .record_review_at(Path::new("late.md"), grade(3), reviewed)
            .unwrap();

        // 23:00 on May 10 at UTC+2 is 21:00 UTC; the local day ends at 22:00 UTC
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let evening = plus_two.with_ymd_and_hms(2026, 5, 10, 23, 0, 0).unwrap();
        assert!(scheduler.list_due_at(None, &evening).unwrap().is_empty());

        // by the next local morning it is due
        let morning = plus_two.with_ymd_and_hms(2026, 5, 11, 8, 0, 0).unwrap();
        assert_eq!(scheduler.list_due_at(None, &morning).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_listing_leaves_cache_stale() {
        let (_temp_dir, root) = vault();
        let config = Config {
            list_command: Some(vec!["/nonexistent/note-tool".to_string()]),
            ..Config::default()
        };
        let mut scheduler = Scheduler::open(&root, None, &config).unwrap();

        assert!(scheduler.list_due_at(None, &Utc::now()).is_err());
        assert_eq!(scheduler.cache_state().unwrap(), CacheState::Stale);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let (_temp_dir, root) = vault();
        write(&root, "r.md");
        {
            let mut scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
            scheduler.validate_and_refresh(true).unwrap();
            scheduler
                .record_review_at(Path::new("r.md"), grade(5), noon(1))
                .unwrap();
        }

        let scheduler = Scheduler::open(&root, None, &Config::default()).unwrap();
        let records = scheduler.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_reviews, 1);
        assert_eq!(records[0].due_date, noon(2));
    }
}

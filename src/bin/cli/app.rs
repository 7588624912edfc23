use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use recall_lib::cache::{CacheState, Validation};
use recall_lib::corpus::StoreLayout;
use recall_lib::schedule::{DueItem, Grade, ReviewStats, SchedulingRecord};
use recall_lib::{Config, Scheduler};

/// Shared application state for CLI commands
pub struct App {
    pub scheduler: Scheduler,
}

impl App {
    /// Load the config and open the schedule for a context directory
    pub fn new(dir: Option<&Path>, context: Option<&str>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => match Config::default_path() {
                Ok(path) => Config::load_or_default(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                Err(e) => {
                    log::debug!("{}; using default config", e);
                    Config::default()
                }
            },
        };

        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };

        let scheduler = Scheduler::open(&dir, context, &config)
            .with_context(|| format!("Failed to open schedule for {}", dir.display()))?;

        Ok(Self { scheduler })
    }

    pub fn layout(&self) -> &StoreLayout {
        self.scheduler.layout()
    }

    /// Absolute path of a corpus-relative note path
    pub fn note_file(&self, note_path: &str) -> PathBuf {
        self.layout().corpus_dir.join(note_path)
    }

    pub fn due(&mut self, limit: Option<usize>) -> Result<Vec<DueItem>> {
        self.scheduler.list_due(limit).context("Failed to list due notes")
    }

    pub fn review(&mut self, path: &Path, grade: u8) -> Result<SchedulingRecord> {
        let grade = Grade::try_from(grade)?;
        self.scheduler
            .record_review(path, grade)
            .with_context(|| format!("Failed to record review of {}", path.display()))
    }

    /// Register a note; `None` if it was tracked already
    pub fn register(&self, path: &Path) -> Result<Option<SchedulingRecord>> {
        match self.scheduler.register_note(path) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_already_exists() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to register {}", path.display())),
        }
    }

    pub fn sync(&mut self, force: bool) -> Result<Validation> {
        self.scheduler
            .validate_and_refresh(force)
            .context("Failed to sync schedule with corpus")
    }

    pub fn stats(&mut self) -> Result<ReviewStats> {
        self.scheduler.stats().context("Failed to get schedule statistics")
    }

    pub fn cache_state(&self) -> Result<CacheState> {
        self.scheduler.cache_state().context("Failed to read cache state")
    }

    pub fn preview(&mut self, path: &Path) -> Result<(SchedulingRecord, [i64; 6])> {
        self.scheduler
            .preview(path)
            .with_context(|| format!("Failed to preview {}", path.display()))
    }
}

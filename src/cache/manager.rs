//! Keeps the scheduling store coherent with the note corpus.
//!
//! Per context the cache moves through:
//!
//! ```text
//! Unknown --validate--> (reconcile) --> Valid
//! Valid   --corpus mtime grows--> Stale --validate--> (reconcile) --> Valid
//! ```
//!
//! A reconciliation first marks the cache invalid and only records the new
//! mtime once every write has landed, so an interrupted or failed pass
//! leaves the context Stale.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::probe::{CoherenceProbe, DirMtimeProbe};
use crate::corpus::{CorpusError, NoteEntry, NoteSource};
use crate::schedule::{RemovalPolicy, ScheduleError, ScheduleStore};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] ScheduleError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Cannot observe corpus: {0}")]
    Probe(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Never synced
    Unknown,
    Valid,
    Stale,
}

/// What one reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Notes present in the corpus
    pub scanned: usize,
    pub adopted: usize,
    pub removed: usize,
    pub archived: usize,
    pub restored: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Validation {
    /// Nothing changed since the last sync; no work done
    Valid,
    Reconciled(ReconcileReport),
}

impl Validation {
    pub fn reconciled(&self) -> bool {
        matches!(self, Self::Reconciled(_))
    }
}

pub struct CacheManager<P: CoherenceProbe = DirMtimeProbe> {
    context: String,
    probe: P,
    policy: RemovalPolicy,
}

impl<P: CoherenceProbe> CacheManager<P> {
    pub fn new(context: String, probe: P, policy: RemovalPolicy) -> Self {
        Self {
            context,
            probe,
            policy,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// Current state without side effects
    pub fn state(&self, store: &ScheduleStore) -> Result<CacheState> {
        let Some(meta) = store.cache_metadata(&self.context)? else {
            return Ok(CacheState::Unknown);
        };

        let observed = self.probe.observe()?;
        if observed <= meta.corpus_dir_mtime {
            Ok(CacheState::Valid)
        } else {
            Ok(CacheState::Stale)
        }
    }

    /// Reconcile only if the corpus may have changed since the last sync
    pub fn validate(&self, store: &mut ScheduleStore, source: &dyn NoteSource) -> Result<Validation> {
        match self.state(store)? {
            CacheState::Valid => {
                log::debug!("Schedule cache for '{}' is valid", self.context);
                Ok(Validation::Valid)
            }
            state => {
                log::debug!("Schedule cache for '{}' is {:?}, reconciling", self.context, state);
                Ok(Validation::Reconciled(self.refresh(store, source)?))
            }
        }
    }

    /// Scan the corpus and bring the store in line with it
    pub fn refresh(&self, store: &mut ScheduleStore, source: &dyn NoteSource) -> Result<ReconcileReport> {
        self.refresh_at(store, source, Utc::now())
    }

    pub fn refresh_at(
        &self,
        store: &mut ScheduleStore,
        source: &dyn NoteSource,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport> {
        store.invalidate(&self.context)?;

        // Observed before listing: changes made during the scan stay detectable.
        let observed = self.probe.observe()?;
        let notes = source.list_notes()?;
        let tracked = store.tracked_paths(&self.context)?;

        let present: HashSet<&str> = notes.iter().map(|n| n.path.as_str()).collect();

        let adopt: Vec<NoteEntry> = notes
            .iter()
            .filter(|n| !tracked.contains_key(&n.path))
            .cloned()
            .collect();

        let restore: Vec<String> = notes
            .iter()
            .filter(|n| tracked.get(&n.path) == Some(&true))
            .map(|n| n.path.clone())
            .collect();

        let mut missing: Vec<String> = tracked
            .iter()
            .filter(|(path, archived)| {
                !present.contains(path.as_str())
                    && !(**archived && self.policy == RemovalPolicy::Archive)
            })
            .map(|(path, _)| path.clone())
            .collect();
        missing.sort();

        let counts = store.reconcile(&self.context, &adopt, &missing, &restore, self.policy, now)?;
        store.record_sync(&self.context, observed, now)?;

        let report = ReconcileReport {
            scanned: notes.len(),
            adopted: counts.adopted,
            removed: counts.removed,
            archived: counts.archived,
            restored: counts.restored,
        };
        log::info!(
            "Reconciled '{}': {} notes, {} adopted, {} removed, {} archived, {} restored",
            self.context,
            report.scanned,
            report.adopted,
            report.removed,
            report.archived,
            report.restored
        );
        Ok(report)
    }

    /// Force the next `validate` to reconcile
    pub fn invalidate(&self, store: &ScheduleStore) -> Result<()> {
        store.invalidate(&self.context)?;
        log::debug!("Invalidated schedule cache for '{}'", self.context);
        Ok(())
    }
}

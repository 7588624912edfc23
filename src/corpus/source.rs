//! Listing the notes of a corpus.
//!
//! The note tool owns the corpus; all we need from it is the set of
//! trackable note paths. Either walk the directory ourselves or ask the
//! tool through a configured command.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid note pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Note listing command failed: {0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, CorpusError>;

/// One trackable note as seen in the corpus
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    /// Corpus-relative path, `/`-separated
    pub path: String,
    pub note_id: String,
}

impl NoteEntry {
    pub fn from_relative(path: String) -> Self {
        let note_id = note_id_for(&path);
        Self { path, note_id }
    }
}

/// Anything that can list the notes currently present in a corpus
pub trait NoteSource {
    fn list_notes(&self) -> Result<Vec<NoteEntry>>;
}

/// Walks the corpus directory and keeps files matching the note patterns.
///
/// Hidden entries and the excluded directory names (sentinel, store) are
/// skipped. Any unreadable entry fails the whole listing.
pub struct DirectoryCorpus {
    root: PathBuf,
    patterns: Vec<Pattern>,
    excluded: Vec<String>,
}

impl DirectoryCorpus {
    pub fn new(root: PathBuf, patterns: &[String], excluded: Vec<String>) -> Result<Self> {
        Ok(Self {
            root,
            patterns: compile_patterns(patterns)?,
            excluded,
        })
    }

    fn is_skipped(&self, name: &str) -> bool {
        name.starts_with('.') || self.excluded.iter().any(|e| e == name)
    }
}

impl NoteSource for DirectoryCorpus {
    fn list_notes(&self) -> Result<Vec<NoteEntry>> {
        let mut notes = BTreeSet::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_skipped(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = relative_note_path(&self.root, entry.path()) else {
                continue;
            };
            if self.patterns.iter().any(|p| p.matches(&relative)) {
                notes.insert(NoteEntry::from_relative(relative));
            }
        }

        Ok(notes.into_iter().collect())
    }
}

/// Asks the external note tool for paths: one per stdout line.
pub struct CommandCorpus {
    root: PathBuf,
    argv: Vec<String>,
}

impl CommandCorpus {
    pub fn new(root: PathBuf, argv: Vec<String>) -> Self {
        Self { root, argv }
    }
}

impl NoteSource for CommandCorpus {
    fn list_notes(&self) -> Result<Vec<NoteEntry>> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| CorpusError::Command("empty command".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if !output.status.success() {
            return Err(CorpusError::Command(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut notes = BTreeSet::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = Path::new(line);
            let full = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.root.join(path)
            };
            match relative_note_path(&self.root, &clean_path(&full)) {
                Some(relative) => {
                    notes.insert(NoteEntry::from_relative(relative));
                }
                None => log::warn!("Ignoring note outside the corpus: {}", line),
            }
        }

        Ok(notes.into_iter().collect())
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(CorpusError::from))
        .collect()
}

/// Note id handed out by the note tool: the file stem
pub fn note_id_for(relative: &str) -> String {
    Path::new(relative)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.to_string())
}

/// `path` relative to `root` as a `/`-separated string, `None` if outside
pub fn relative_note_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Resolve `.` and `..` without touching the filesystem
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Map a user-supplied note path onto its corpus-relative key.
///
/// Relative input is tried against `base_dir` first, then the corpus
/// directory itself. Existing files win over purely lexical matches.
pub fn normalize_note_path(corpus_dir: &Path, base_dir: &Path, input: &Path) -> Option<String> {
    let candidates = if input.is_absolute() {
        vec![input.to_path_buf()]
    } else {
        vec![base_dir.join(input), corpus_dir.join(input)]
    };

    candidates
        .iter()
        .find_map(|c| {
            std::fs::canonicalize(c)
                .ok()
                .and_then(|resolved| relative_note_path(corpus_dir, &resolved))
        })
        .or_else(|| {
            candidates
                .iter()
                .find_map(|c| relative_note_path(corpus_dir, &clean_path(c)))
        })
}

//! Corpus root discovery and store placement

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Where the corpus and the scheduling store live for one context directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreLayout {
    pub context_dir: PathBuf,
    /// Corpus root when found, otherwise the context directory
    pub corpus_dir: PathBuf,
    /// Dedicated directory holding the store file
    pub store_dir: PathBuf,
    pub corpus_root_found: bool,
}

impl StoreLayout {
    /// Store file of `context`: each context gets its own subdirectory
    pub fn db_path(&self, context: &str, store_file: &str) -> PathBuf {
        self.store_dir.join(context_dir_name(context)).join(store_file)
    }
}

/// `context` as a single safe path component
fn context_dir_name(context: &str) -> String {
    let name: String = context
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        format!("_{}", name)
    } else {
        name
    }
}

/// Walk up from `context_dir` looking for a directory containing `sentinel`.
///
/// Probe errors other than "not found" end the search with `None`.
pub fn find_corpus_root(context_dir: &Path, sentinel: &str) -> Option<PathBuf> {
    search_upward(&absolute(context_dir), sentinel, is_sentinel_dir)
}

fn is_sentinel_dir(path: &Path) -> io::Result<bool> {
    fs::metadata(path).map(|meta| meta.is_dir())
}

fn search_upward(
    start: &Path,
    sentinel: &str,
    probe: impl Fn(&Path) -> io::Result<bool>,
) -> Option<PathBuf> {
    let mut dir = Some(start);

    while let Some(candidate) = dir {
        match probe(&candidate.join(sentinel)) {
            Ok(true) => return Some(candidate.to_path_buf()),
            Ok(false) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!(
                    "Stopped corpus root search at {:?}: {}; using context directory",
                    candidate,
                    e
                );
                return None;
            }
        }
        dir = candidate.parent();
    }

    None
}

/// Pick the store directory for `context_dir` and create it.
///
/// The store sits next to the sentinel when a corpus root exists, so its
/// lifetime follows the corpus; otherwise directly under the context dir.
pub fn resolve_store_dir(
    context_dir: &Path,
    sentinel: &str,
    store_dir_name: &str,
) -> io::Result<StoreLayout> {
    resolve_with(context_dir, sentinel, store_dir_name, is_sentinel_dir)
}

fn resolve_with(
    context_dir: &Path,
    sentinel: &str,
    store_dir_name: &str,
    probe: impl Fn(&Path) -> io::Result<bool>,
) -> io::Result<StoreLayout> {
    let context_dir = absolute(context_dir);
    let root = search_upward(&context_dir, sentinel, probe);
    let corpus_root_found = root.is_some();
    let corpus_dir = root.unwrap_or_else(|| context_dir.clone());
    let store_dir = corpus_dir.join(store_dir_name);

    fs::create_dir_all(&store_dir)?;
    log::debug!("Schedule store directory: {:?}", store_dir);

    Ok(StoreLayout {
        context_dir,
        corpus_dir,
        store_dir,
        corpus_root_found,
    })
}

/// Canonical form when the path exists, otherwise anchored at the cwd
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

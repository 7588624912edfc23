//! The note corpus as seen from the scheduler
//!
//! This module provides:
//! - Corpus root discovery and store placement
//! - Note listing, by directory walk or through the note tool

mod root;
mod source;

pub use root::{find_corpus_root, resolve_store_dir, StoreLayout};
pub use source::{
    clean_path, normalize_note_path, note_id_for, relative_note_path, CommandCorpus, CorpusError,
    DirectoryCorpus, NoteEntry, NoteSource,
};

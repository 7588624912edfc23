//! Cheap corpus-change detection

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reports a value that grows whenever the set of notes may have changed.
///
/// Swapping the implementation (e.g. for a file watcher) leaves the store
/// and the review engine untouched.
pub trait CoherenceProbe {
    /// Current corpus fingerprint in nanoseconds since the Unix epoch
    fn observe(&self) -> io::Result<i64>;
}

/// Modification time of the corpus root directory.
///
/// Entry creation, rename and deletion bump it; editing a note's contents
/// does not, which is fine since only note presence matters here.
#[derive(Debug, Clone)]
pub struct DirMtimeProbe {
    dir: PathBuf,
}

impl DirMtimeProbe {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl CoherenceProbe for DirMtimeProbe {
    fn observe(&self) -> io::Result<i64> {
        let modified = fs::metadata(&self.dir)?.modified()?;
        Ok(system_time_nanos(modified))
    }
}

/// Signed nanoseconds relative to the Unix epoch, saturating
pub fn system_time_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

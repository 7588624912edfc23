//! Cache coherence between the scheduling store and the note corpus

mod manager;
mod probe;

pub use manager::{CacheError, CacheManager, CacheState, ReconcileReport, Validation};
pub use probe::{system_time_nanos, CoherenceProbe, DirMtimeProbe};

//! Persisted sequence counter for generating unique test identities.
//!
//! Repeated suite runs register against a stateful backend, so email aliases
//! and phone-number suffixes must not collide with earlier runs. The counter
//! keeps a small key-to-integer map in a JSON file and hands out monotonically
//! increasing values per key, surviving process restarts.
//!
//! Single-writer only: the state is read, modified, and written back with no
//! lock, which is acceptable under the one-test-runner-process assumption. Not
//! a defect to fix here - a second concurrent writer would need a different
//! design entirely.
//!
//! # Example
//!
//! ```no_run
//! use otp_inbox::SequenceCounter;
//!
//! let counter = SequenceCounter::at_default_location();
//! let run = counter.next("register");
//! let alias = format!("suite+run{run}@gmail.com");
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default state-file path, relative to the suite's working directory.
pub const DEFAULT_STATE_FILE: &str = ".test-state.json";

/// File-backed monotonic counter keyed by scenario name.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    path: PathBuf,
}

impl SequenceCounter {
    /// Creates a counter persisting to the given file.
    ///
    /// The path is injectable so tests do not depend on the real location.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a counter at the suite's conventional state-file path.
    #[must_use]
    pub fn at_default_location() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }

    /// Returns the state-file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Increments and returns the counter for `key`.
    ///
    /// An absent key starts at 0, so the first call returns 1. A missing or
    /// corrupt state file is treated as empty rather than an error. A failed
    /// write is logged and the incremented value is still returned - losing
    /// one increment beats failing the scenario that asked for it.
    #[must_use]
    pub fn next(&self, key: &str) -> u64 {
        let mut state = self.read_state();
        let next = state.get(key).copied().unwrap_or(0) + 1;
        state.insert(key.to_string(), next);
        self.write_state(&state);
        next
    }

    fn read_state(&self) -> BTreeMap<String, u64> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "Corrupt sequence state, starting fresh");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    fn write_state(&self, state: &BTreeMap<String, u64>) {
        let serialized =
            serde_json::to_string_pretty(state).expect("map of integers serializes");
        if let Err(e) = std::fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %e, "Unable to write sequence state");
        }
    }
}

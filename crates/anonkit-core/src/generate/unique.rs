use std::collections::{HashMap, HashSet};

use crate::generate::value::Value;

/// Default number of attempts a `unique` call makes before giving up.
pub const DEFAULT_MAX_RETRIES: usize = 10_000;

/// Tracks values a generator has already returned, per formatter method.
///
/// One tracker lives inside each cached generator, so a `unique` column
/// stays unique for the whole run rather than per row or per chunk.
#[derive(Debug)]
pub struct UniqueTracker {
    /// Map from formatter method name to the set of values already emitted.
    seen: HashMap<String, HashSet<String>>,
    /// Maximum retries before giving up.
    pub max_retries: usize,
}

impl UniqueTracker {
    pub fn new() -> Self {
        Self {
            seen: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Record `value` for `method` if it has not been seen. Returns `false`
    /// on a duplicate.
    pub fn try_insert(&mut self, method: &str, value: &Value) -> bool {
        self.seen
            .entry(method.to_string())
            .or_default()
            .insert(value.to_unique_key())
    }

    /// Number of distinct values emitted so far for `method`.
    pub fn count(&self, method: &str) -> usize {
        self.seen.get(method).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for UniqueTracker {
    fn default() -> Self {
        Self::new()
    }
}

//! Memoized classifications, keyed by exact message text.
//!
//! Keys are the message text as received: case-sensitive, untrimmed. The
//! cache is unbounded and entries are never replaced or removed for the
//! life of the process. Writes happen under the concurrency gate; reads do
//! not, so a read racing a write for the same text can at worst cause one
//! redundant upstream call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use super::tier::RiskTier;

#[derive(Debug, Default)]
pub struct RiskCache {
    entries: RwLock<HashMap<String, RiskTier>>,
    /// Hits counter for diagnostics.
    hits: AtomicU64,
    /// Misses counter for diagnostics.
    misses: AtomicU64,
}

impl RiskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the tier for `text`.
    pub fn get(&self, text: &str) -> Option<RiskTier> {
        let found = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
            .copied();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store the tier for `text` unless one is already present.
    ///
    /// Returns the tier that ends up cached: the existing one wins.
    pub fn insert(&self, text: &str, tier: RiskTier) -> RiskTier {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *entries.entry(text.to_string()).or_insert(tier)
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

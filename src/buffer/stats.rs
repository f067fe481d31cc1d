//! Node cache statistics tracking.

use std::fmt;

/// Counters kept by the node cache.
///
/// The cache is single-threaded and owned by the tree, so these are plain
/// integers updated through `&mut`. Copies can be printed or compared freely.
///
/// # Example
/// ```
/// use pagetree::CacheStats;
///
/// let mut stats = CacheStats::default();
/// stats.cache_hits += 3;
/// stats.cache_misses += 1;
/// assert_eq!(stats.hit_rate(), 0.75);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads served from memory.
    pub cache_hits: u64,

    /// Loads that had to go to the store.
    pub cache_misses: u64,

    /// Nodes dropped from residency by the replacer.
    pub evictions: u64,

    /// Node records read from the store.
    pub nodes_read: u64,

    /// Node records written to the store.
    pub nodes_written: u64,
}

impl CacheStats {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, written: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.nodes_written,
            self.hit_rate() * 100.0
        )
    }
}

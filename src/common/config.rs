//! Configuration constants and tree settings for pagetree.

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Every node record must fit in a single page payload, which bounds the
/// usable minimal degree for a given key type.
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// Page holding the file metadata (magic, root pointer, free list).
pub const META_PAGE_ID: u32 = 0;

/// Smallest legal minimal degree `t`.
pub const MIN_DEGREE_LOWER_BOUND: usize = 2;

/// Default minimal degree.
///
/// With `i64` keys a full node (199 keys, 200 children) encodes to roughly
/// 2.4KB, comfortably inside one page.
///
/// This default only suits small keys on the file store. A full node spends
/// about `2t` bytes per byte of key, so with `String` or `Vec<u8>` keys
/// longer than about 12 bytes it overflows a page and inserts fail with
/// `Error::NodeTooLarge`. Pick `t` so that
/// `7 + (2t - 1) * (4 + max_key_len) + 8t` stays within a page payload.
pub const DEFAULT_MIN_DEGREE: usize = 100;

/// Default number of nodes kept resident in the node cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Settings fixed when a tree is opened.
///
/// For fixed-width keys, [`BTree::open`](crate::BTree::open) rejects a
/// degree whose full node would not fit in one store record. Variable-length
/// keys cannot be checked up front; size the degree for the longest key
/// (see [`DEFAULT_MIN_DEGREE`]).
///
/// # Example
/// ```
/// use pagetree::TreeConfig;
///
/// let config = TreeConfig::default().with_min_degree(2).with_cache_capacity(8);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_keys(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Minimal degree `t`: non-root nodes hold `t-1 ..= 2t-1` keys.
    pub min_degree: usize,

    /// Maximum number of resident nodes before FIFO eviction kicks in.
    pub cache_capacity: usize,
}

impl TreeConfig {
    /// Create a config with the default degree and cache capacity.
    pub fn new() -> Self {
        Self {
            min_degree: DEFAULT_MIN_DEGREE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Set the minimal degree.
    pub fn with_min_degree(mut self, min_degree: usize) -> Self {
        self.min_degree = min_degree;
        self
    }

    /// Set the node cache capacity.
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Maximum keys per node (`2t - 1`).
    #[inline]
    pub fn max_keys(&self) -> usize {
        2 * self.min_degree - 1
    }

    /// Minimum keys per non-root node (`t - 1`).
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.min_degree - 1
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `min_degree < 2` or the cache
    /// capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.min_degree < MIN_DEGREE_LOWER_BOUND {
            return Err(Error::InvalidConfig(format!(
                "min_degree must be >= {}, got {}",
                MIN_DEGREE_LOWER_BOUND, self.min_degree
            )));
        }
        if self.cache_capacity == 0 {
            return Err(Error::InvalidConfig(
                "cache_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::default();
        assert_eq!(config.min_degree, DEFAULT_MIN_DEGREE);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_bounds() {
        let config = TreeConfig::new().with_min_degree(3);
        assert_eq!(config.max_keys(), 5);
        assert_eq!(config.min_keys(), 2);
    }

    #[test]
    fn test_degree_below_two_rejected() {
        let config = TreeConfig::new().with_min_degree(1);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = TreeConfig::new().with_cache_capacity(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}

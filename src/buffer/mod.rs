//! Node cache management.
//!
//! The node cache is the in-memory layer between the B-tree engine and the
//! node store. Every node access goes through it.
//!
//! # Components
//! - [`NodeCache`] - The bounded, write-back node cache
//! - [`CacheStats`] - Hit/miss/eviction counters
//! - [`replacer`] - Eviction policy implementations

mod node_cache;
pub mod replacer;
mod stats;

pub use node_cache::NodeCache;
pub use stats::CacheStats;

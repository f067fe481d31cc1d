//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`FifoReplacer`] - Insertion-order eviction used by the node cache

mod fifo;

pub use fifo::FifoReplacer;

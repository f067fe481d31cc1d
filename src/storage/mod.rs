//! Storage layer - disk I/O, page formats and node stores.
//!
//! This module handles persistent storage:
//! - [`NodeStore`] - Keyed byte storage for encoded nodes plus a root slot
//! - [`MemoryNodeStore`] / [`FileNodeStore`] - The two store implementations
//! - [`DiskManager`] - Low-level page file I/O with a free list
//! - [`page`] - Page types and layouts

mod disk_manager;
mod file_store;
mod node_store;
pub mod page;

pub use disk_manager::DiskManager;
pub use file_store::FileNodeStore;
pub use node_store::{MemoryNodeStore, NodeStore};

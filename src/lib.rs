//! pagetree - A disk-backed B-tree with a bounded node cache.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            pagetree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Index Layer (index/)                   │   │
//! │  │     BTree: search, insert, delete, update, export       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Node Cache (buffer/)                    │   │
//! │  │   ┌─────────────────────────────────────────────────┐   │   │
//! │  │   │   FIFO eviction, write-back of dirty nodes      │   │   │
//! │  │   └─────────────────────────────────────────────────┘   │   │
//! │  │               NodeCache + CacheStats                    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Storage Layer (storage/)                │   │
//! │  │   NodeStore: MemoryNodeStore | FileNodeStore            │   │
//! │  │   DiskManager + Page + PageHeader + free list           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeId, PageId, Error, config)
//! - [`buffer`] - The node cache and its eviction policy
//! - [`storage`] - Node stores, disk I/O and page formats
//! - [`index`] - The B-tree engine
//!
//! # Quick Start
//! ```no_run
//! use pagetree::{BTree, FileNodeStore, TreeConfig};
//!
//! let store = FileNodeStore::open_or_create("index.db").unwrap();
//! let mut tree = BTree::<u64, _>::open(store, TreeConfig::default()).unwrap();
//!
//! tree.insert(42).unwrap();
//! assert!(tree.contains(&42).unwrap());
//! tree.flush().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, NodeId, PageId, Result, TreeConfig};

pub use buffer::{CacheStats, NodeCache};
pub use index::{BTree, Node, NodeKey, NodeSnapshot};
pub use storage::{DiskManager, FileNodeStore, MemoryNodeStore, NodeStore};

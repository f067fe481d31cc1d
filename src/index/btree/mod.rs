//! Disk-backed B-tree.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  BTree<K, S>                 │
//! │   search / insert / delete / update          │
//! │   split, merge, borrow (balance)             │
//! └──────────────────────┬───────────────────────┘
//!                        │ load(id) / save(node)
//! ┌──────────────────────▼───────────────────────┐
//! │              NodeCache<K, S> (FIFO)          │
//! └──────────────────────┬───────────────────────┘
//!                        │ encoded bytes by NodeId
//! ┌──────────────────────▼───────────────────────┐
//! │                 NodeStore (S)                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Nodes never hold pointers to each other. A child is a [`NodeId`] that
//! the cache resolves on demand, so only the nodes on the current path
//! need to be in memory.
//!
//! [`NodeId`]: crate::common::NodeId

mod balance;
mod export;
mod node;
mod tree;
mod verify;

pub use export::NodeSnapshot;
pub use node::{Node, NodeKey};
pub use tree::BTree;

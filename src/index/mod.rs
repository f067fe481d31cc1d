//! Index structures.
//!
//! - [`btree`] - A B-tree whose nodes live in a [`NodeStore`](crate::storage::NodeStore)

pub mod btree;

pub use btree::{BTree, Node, NodeKey, NodeSnapshot};

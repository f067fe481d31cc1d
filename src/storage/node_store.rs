//! Node store abstraction.
//!
//! The [`NodeStore`] trait is the durable side of the node cache: a keyed
//! byte store for encoded nodes plus a single root-pointer slot. It knows
//! nothing about B-tree structure.
//!
//! Two implementations ship with the crate:
//! - [`MemoryNodeStore`] - a shared in-memory map, for tests and ephemeral trees
//! - [`FileNodeStore`](super::FileNodeStore) - pages in a database file

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{NodeId, Result};

/// Durable keyed storage for encoded nodes.
///
/// Methods take `&self`; implementations use interior mutability so a
/// store can be shared by handle.
pub trait NodeStore {
    /// Reserve a fresh node identifier.
    ///
    /// # Errors
    /// Returns an I/O error if the reservation cannot be made durable.
    fn allocate(&self) -> Result<NodeId>;

    /// Read the encoded node, or `None` if nothing is stored under `id`.
    ///
    /// # Errors
    /// Returns an I/O or corruption error from the backing medium.
    fn get(&self, id: NodeId) -> Result<Option<Vec<u8>>>;

    /// Store the encoded node under `id`, replacing previous contents.
    ///
    /// # Errors
    /// Returns an I/O error if the write fails.
    fn put(&self, id: NodeId, bytes: &[u8]) -> Result<()>;

    /// Remove the node stored under `id`. Absent ids are ignored.
    ///
    /// # Errors
    /// Returns an I/O error if the removal fails.
    fn remove(&self, id: NodeId) -> Result<()>;

    /// The persisted root pointer.
    ///
    /// # Errors
    /// Returns an I/O error if the slot cannot be read.
    fn get_root(&self) -> Result<Option<NodeId>>;

    /// Persist (or clear) the root pointer.
    ///
    /// # Errors
    /// Returns an I/O error if the write fails.
    fn put_root(&self, root: Option<NodeId>) -> Result<()>;

    /// Push buffered writes to stable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Largest record `put` accepts, if bounded.
    fn max_record_size(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    nodes: HashMap<NodeId, Vec<u8>>,
    root: Option<NodeId>,
    next_id: u32,
    writes: u64,
    read_only: bool,
}

/// In-memory node store.
///
/// Clones share the same underlying map, so a tree can be dropped and
/// reopened against a clone to exercise persistence without a file.
///
/// # Example
/// ```
/// use pagetree::storage::{MemoryNodeStore, NodeStore};
///
/// let store = MemoryNodeStore::new();
/// let id = store.allocate().unwrap();
/// store.put(id, b"node").unwrap();
/// assert_eq!(store.get(id).unwrap().as_deref(), Some(&b"node"[..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryNodeStore {
    /// Create an empty store. Identifiers start at 1.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner {
                next_id: 1,
                ..MemoryInner::default()
            })),
        }
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Whether no nodes are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// Whether a node is stored under `id`.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.read().nodes.contains_key(&id)
    }

    /// Total successful `put` calls.
    pub fn write_count(&self) -> u64 {
        self.inner.read().writes
    }

    /// Make every subsequent write fail with `PermissionDenied`.
    ///
    /// Used to exercise store-failure propagation.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.write().read_only = read_only;
    }

    fn check_writable(inner: &MemoryInner) -> Result<()> {
        if inner.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only").into());
        }
        Ok(())
    }
}

impl NodeStore for MemoryNodeStore {
    fn allocate(&self) -> Result<NodeId> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner)?;
        let id = NodeId::new(inner.next_id);
        inner.next_id += 1;
        Ok(id)
    }

    fn get(&self, id: NodeId) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().nodes.get(&id).cloned())
    }

    fn put(&self, id: NodeId, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner)?;
        inner.nodes.insert(id, bytes.to_vec());
        inner.writes += 1;
        Ok(())
    }

    fn remove(&self, id: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner)?;
        inner.nodes.remove(&id);
        Ok(())
    }

    fn get_root(&self) -> Result<Option<NodeId>> {
        Ok(self.inner.read().root)
    }

    fn put_root(&self, root: Option<NodeId>) -> Result<()> {
        let mut inner = self.inner.write();
        Self::check_writable(&inner)?;
        inner.root = root;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    #[test]
    fn test_allocate_is_unique() {
        let store = MemoryNodeStore::new();
        let a = store.allocate().unwrap();
        let b = store.allocate().unwrap();
        assert_eq!(a, NodeId::new(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_put_get_remove() {
        let store = MemoryNodeStore::new();
        let id = store.allocate().unwrap();

        assert_eq!(store.get(id).unwrap(), None);

        store.put(id, &[1, 2, 3]).unwrap();
        assert_eq!(store.get(id).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.write_count(), 1);

        store.remove(id).unwrap();
        assert_eq!(store.get(id).unwrap(), None);

        // Removing again is silent
        store.remove(id).unwrap();
    }

    #[test]
    fn test_root_slot() {
        let store = MemoryNodeStore::new();
        assert_eq!(store.get_root().unwrap(), None);

        store.put_root(Some(NodeId::new(4))).unwrap();
        assert_eq!(store.get_root().unwrap(), Some(NodeId::new(4)));

        store.put_root(None).unwrap();
        assert_eq!(store.get_root().unwrap(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryNodeStore::new();
        let handle = store.clone();

        let id = store.allocate().unwrap();
        store.put(id, b"x").unwrap();

        assert!(handle.contains(id));
        assert_eq!(handle.allocate().unwrap(), NodeId::new(2));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let store = MemoryNodeStore::new();
        let id = store.allocate().unwrap();
        store.set_read_only(true);

        assert!(matches!(store.put(id, b"x"), Err(Error::Io(_))));
        assert!(matches!(store.put_root(Some(id)), Err(Error::Io(_))));
        assert_eq!(store.get(id).unwrap(), None);

        store.set_read_only(false);
        assert!(store.put(id, b"x").is_ok());
    }
}

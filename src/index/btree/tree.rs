//! The B-tree engine: search, insert, delete and update over a node cache.

use tracing::debug;

use crate::buffer::{CacheStats, NodeCache};
use crate::common::{Error, NodeId, Result, TreeConfig};
use crate::index::btree::{Node, NodeKey};
use crate::storage::NodeStore;

/// A B-tree of keys whose nodes live in a [`NodeStore`].
///
/// Nodes reference their children by [`NodeId`]; every access goes through
/// the tree's own [`NodeCache`]. The algorithms load one node at a time,
/// mutate the owned copy, and save it back before moving on.
///
/// Reads take `&mut self` too, because loading changes cache residency.
///
/// # Example
/// ```
/// use pagetree::{BTree, TreeConfig};
/// use pagetree::storage::MemoryNodeStore;
///
/// let config = TreeConfig::default().with_min_degree(2);
/// let mut tree = BTree::<i64, _>::open(MemoryNodeStore::new(), config).unwrap();
///
/// for k in [10, 20, 5, 6, 12, 30, 7, 17] {
///     tree.insert(k).unwrap();
/// }
/// assert!(tree.contains(&12).unwrap());
/// assert!(tree.delete(&12).unwrap());
/// assert_eq!(tree.keys().unwrap(), vec![5, 6, 7, 10, 17, 20, 30]);
/// ```
pub struct BTree<K: NodeKey, S: NodeStore> {
    pub(super) cache: NodeCache<K, S>,
    pub(super) root: Option<NodeId>,
    pub(super) min_degree: usize,
}

impl<K: NodeKey, S: NodeStore> BTree<K, S> {
    /// Open a tree over `store`.
    ///
    /// Adopts the store's persisted root pointer if there is one; otherwise
    /// the tree starts empty. The minimal degree is not persisted, so a
    /// store must be reopened with the degree it was built with.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` for unusable settings, including a
    /// degree whose full node of fixed-width keys would not fit in one store
    /// record, or the store's error if the root pointer cannot be read.
    pub fn open(store: S, config: TreeConfig) -> Result<Self> {
        config.validate()?;

        let full_node = Node::<K>::max_encoded_len(config.min_degree);
        if let (Some(needed), Some(max)) = (full_node, store.max_record_size()) {
            if needed > max {
                return Err(Error::InvalidConfig(format!(
                    "a full node at min_degree {} needs {} bytes, the store holds {}",
                    config.min_degree, needed, max
                )));
            }
        }

        let root = store.get_root()?;
        let cache = NodeCache::new(store, config.cache_capacity)?;

        debug!(?root, min_degree = config.min_degree, "opened tree");
        Ok(Self {
            cache,
            root,
            min_degree: config.min_degree,
        })
    }

    /// The minimal degree `t`.
    #[inline]
    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    /// The current root node, or `None` for an empty tree.
    #[inline]
    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Whether the tree holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// The node cache.
    pub fn cache(&self) -> &NodeCache<K, S> {
        &self.cache
    }

    /// Node cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The backing node store.
    pub fn store(&self) -> &S {
        self.cache.store()
    }

    /// Write every dirty node to the store and sync it.
    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush_all()
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Locate `key`, returning the node holding it and its index there.
    pub fn search(&mut self, key: &K) -> Result<Option<(NodeId, usize)>> {
        let Some(mut current) = self.root else {
            return Ok(None);
        };

        loop {
            let node = self.cache.load(current)?;
            let i = node.find_index(key);

            if node.key_matches(i, key) {
                return Ok(Some((current, i)));
            }
            if node.is_leaf() {
                return Ok(None);
            }
            current = node.child(i)?;
        }
    }

    /// Whether `key` is in the tree.
    pub fn contains(&mut self, key: &K) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// Smallest key, if any.
    pub fn min_key(&mut self) -> Result<Option<K>> {
        match self.root {
            Some(root) => self.min_key_in(root).map(Some),
            None => Ok(None),
        }
    }

    /// Largest key, if any.
    pub fn max_key(&mut self) -> Result<Option<K>> {
        match self.root {
            Some(root) => self.max_key_in(root).map(Some),
            None => Ok(None),
        }
    }

    /// Leftmost key of the subtree rooted at `id`.
    pub(super) fn min_key_in(&mut self, id: NodeId) -> Result<K> {
        let mut node = self.cache.load(id)?;
        while !node.is_leaf() {
            node = self.cache.load(node.child(0)?)?;
        }
        node.keys
            .first()
            .cloned()
            .ok_or_else(|| Error::invariant(format!("leaf {} is empty", node.id)))
    }

    /// Rightmost key of the subtree rooted at `id`.
    pub(super) fn max_key_in(&mut self, id: NodeId) -> Result<K> {
        let mut node = self.cache.load(id)?;
        while !node.is_leaf() {
            node = self.cache.load(node.child(node.key_count())?)?;
        }
        node.keys
            .last()
            .cloned()
            .ok_or_else(|| Error::invariant(format!("leaf {} is empty", node.id)))
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert `key`.
    ///
    /// Returns `false` without touching the tree if the key is already
    /// present. Full nodes are split on the way down, so the descent never
    /// has to back up.
    pub fn insert(&mut self, key: K) -> Result<bool> {
        if self.search(&key)?.is_some() {
            return Ok(false);
        }

        let Some(root_id) = self.root else {
            let id = self.cache.allocate_id()?;
            self.cache.save(Node::leaf(id, vec![key]))?;
            self.set_root(id)?;
            return Ok(true);
        };

        let root = self.cache.load(root_id)?;
        if root.is_full(self.min_degree) {
            let new_root_id = self.cache.allocate_id()?;
            let mut new_root = Node::internal(new_root_id, Vec::new(), vec![root_id]);
            if let Err(e) = self.split_child(&mut new_root, 0) {
                self.cache.delete(new_root_id)?;
                return Err(e);
            }
            self.set_root(new_root_id)?;
            debug!(old = %root_id, new = %new_root_id, "root split");
            self.insert_non_full(new_root_id, key)?;
        } else {
            self.insert_non_full(root_id, key)?;
        }

        Ok(true)
    }

    fn insert_non_full(&mut self, id: NodeId, key: K) -> Result<()> {
        let mut node = self.cache.load(id)?;
        let mut i = node.find_index(&key);

        if node.is_leaf() {
            node.keys.insert(i, key);
            return self.cache.save(node);
        }

        let child = self.cache.load(node.child(i)?)?;
        if child.is_full(self.min_degree) {
            self.split_child(&mut node, i)?;
            if node.keys[i] < key {
                i += 1;
            }
        }

        let next = node.child(i)?;
        self.insert_non_full(next, key)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Delete `key`.
    ///
    /// Returns `false` without touching the tree if the key is absent.
    /// Children are topped up to `t` keys on the way down so removal never
    /// has to back up. An emptied root is replaced by its only child, or the
    /// tree becomes empty and the persisted root pointer is cleared.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        if self.search(key)?.is_none() {
            return Ok(false);
        }
        let root_id = self
            .root
            .ok_or_else(|| Error::invariant("found a key in a tree without a root"))?;

        self.delete_from(root_id, key)?;

        let root = self.cache.load(root_id)?;
        if root.keys.is_empty() {
            if root.is_leaf() {
                self.clear_root()?;
                self.cache.delete(root_id)?;
                debug!(old = %root_id, "tree emptied");
            } else {
                let new_root = root.child(0)?;
                self.set_root(new_root)?;
                self.cache.delete(root_id)?;
                debug!(old = %root_id, new = %new_root, "root collapsed");
            }
        }

        Ok(true)
    }

    fn delete_from(&mut self, id: NodeId, key: &K) -> Result<()> {
        let mut node = self.cache.load(id)?;
        let i = node.find_index(key);
        let found = node.key_matches(i, key);

        if node.is_leaf() {
            if found {
                node.keys.remove(i);
                self.cache.save(node)?;
            }
            return Ok(());
        }

        if found {
            return self.delete_internal_key(node, i, key);
        }

        let child = self.cache.load(node.child(i)?)?;
        let index = if child.key_count() < self.min_degree {
            self.fill(&mut node, i)?
        } else {
            i
        };

        let next = node.child(index)?;
        self.delete_from(next, key)
    }

    /// Remove `keys[i]` (== `key`) from internal node `node`.
    fn delete_internal_key(&mut self, mut node: Node<K>, i: usize, key: &K) -> Result<()> {
        let left_id = node.child(i)?;
        let right_id = node.child(i + 1)?;

        if self.cache.load(left_id)?.key_count() >= self.min_degree {
            let predecessor = self.max_key_in(left_id)?;
            node.keys[i] = predecessor.clone();
            self.cache.save(node)?;
            self.delete_from(left_id, &predecessor)
        } else if self.cache.load(right_id)?.key_count() >= self.min_degree {
            let successor = self.min_key_in(right_id)?;
            node.keys[i] = successor.clone();
            self.cache.save(node)?;
            self.delete_from(right_id, &successor)
        } else {
            self.merge(&mut node, i)?;
            self.delete_from(left_id, key)
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Replace `old` with `new`.
    ///
    /// Runs `delete(old)` and, only if that removed something,
    /// `insert(new)`. Returns whether `old` was removed. If `new` was
    /// already present the tree simply loses `old`.
    ///
    /// This is **not atomic**. Each step is durable on its own, so a fatal
    /// error (or a crash) after the delete leaves `old` gone and `new`
    /// absent.
    pub fn update(&mut self, old: &K, new: K) -> Result<bool> {
        if !self.delete(old)? {
            return Ok(false);
        }
        self.insert(new)?;
        Ok(true)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// All keys in ascending order.
    pub fn keys(&mut self) -> Result<Vec<K>> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_keys(root, &mut out)?;
        }
        Ok(out)
    }

    /// Number of keys in the tree.
    pub fn len(&mut self) -> Result<usize> {
        match self.root {
            Some(root) => self.count_keys(root),
            None => Ok(0),
        }
    }

    fn collect_keys(&mut self, id: NodeId, out: &mut Vec<K>) -> Result<()> {
        let node = self.cache.load(id)?;
        if node.is_leaf() {
            out.extend(node.keys);
            return Ok(());
        }

        for (i, &child) in node.children.iter().enumerate() {
            self.collect_keys(child, out)?;
            if let Some(key) = node.keys.get(i) {
                out.push(key.clone());
            }
        }
        Ok(())
    }

    fn count_keys(&mut self, id: NodeId) -> Result<usize> {
        let node = self.cache.load(id)?;
        let mut count = node.key_count();
        for &child in &node.children {
            count += self.count_keys(child)?;
        }
        Ok(count)
    }

    // ========================================================================
    // Root management
    // ========================================================================

    /// Make `id` the root, writing the node before the pointer.
    pub(super) fn set_root(&mut self, id: NodeId) -> Result<()> {
        self.cache.flush(id)?;
        self.cache.store().put_root(Some(id))?;
        self.root = Some(id);
        Ok(())
    }

    pub(super) fn clear_root(&mut self) -> Result<()> {
        self.cache.store().put_root(None)?;
        self.root = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryNodeStore;

    fn create_tree(min_degree: usize) -> BTree<i64, MemoryNodeStore> {
        let config = TreeConfig::default()
            .with_min_degree(min_degree)
            .with_cache_capacity(16);
        BTree::open(MemoryNodeStore::new(), config).unwrap()
    }

    #[test]
    fn test_empty_tree() {
        let mut tree = create_tree(2);
        assert!(tree.is_empty());
        assert_eq!(tree.search(&1).unwrap(), None);
        assert_eq!(tree.keys().unwrap(), Vec::<i64>::new());
        assert_eq!(tree.len().unwrap(), 0);
        assert_eq!(tree.min_key().unwrap(), None);
        assert!(!tree.delete(&1).unwrap());
    }

    #[test]
    fn test_invalid_degree_rejected() {
        let config = TreeConfig::default().with_min_degree(1);
        assert!(matches!(
            BTree::<i64, _>::open(MemoryNodeStore::new(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_first_insert_creates_leaf_root() {
        let mut tree = create_tree(2);
        assert!(tree.insert(7).unwrap());

        let root = tree.root_id().unwrap();
        assert_eq!(tree.search(&7).unwrap(), Some((root, 0)));
        assert_eq!(tree.store().get_root().unwrap(), Some(root));
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut tree = create_tree(2);
        for k in 1..=10 {
            tree.insert(k).unwrap();
        }
        let before = tree.cache_stats().nodes_written;
        let root = tree.root_id();

        assert!(!tree.insert(5).unwrap());
        assert_eq!(tree.keys().unwrap(), (1..=10).collect::<Vec<_>>());
        assert_eq!(tree.root_id(), root);
        assert_eq!(tree.cache_stats().nodes_written, before);
    }

    #[test]
    fn test_search_reports_position() {
        let mut tree = create_tree(3);
        for k in [3, 1, 2] {
            tree.insert(k).unwrap();
        }
        let root = tree.root_id().unwrap();
        assert_eq!(tree.search(&1).unwrap(), Some((root, 0)));
        assert_eq!(tree.search(&3).unwrap(), Some((root, 2)));
        assert_eq!(tree.search(&4).unwrap(), None);
    }

    #[test]
    fn test_min_max() {
        let mut tree = create_tree(2);
        for k in [50, -3, 12, 99, 0, 41] {
            tree.insert(k).unwrap();
        }
        assert_eq!(tree.min_key().unwrap(), Some(-3));
        assert_eq!(tree.max_key().unwrap(), Some(99));
    }

    #[test]
    fn test_delete_key_held_by_internal_node() {
        let mut tree = create_tree(2);
        for k in 1..=10 {
            tree.insert(k).unwrap();
        }
        let root = tree.root_id().unwrap();
        let root_keys = tree.cache.load(root).unwrap().keys().to_vec();

        let victim = root_keys[0];
        assert!(tree.delete(&victim).unwrap());
        assert!(!tree.contains(&victim).unwrap());
        tree.check_invariants().unwrap();
        assert_eq!(tree.len().unwrap(), 9);
    }

    #[test]
    fn test_delete_last_key_clears_root() {
        let mut tree = create_tree(2);
        tree.insert(1).unwrap();
        let root = tree.root_id().unwrap();

        assert!(tree.delete(&1).unwrap());
        assert!(tree.is_empty());
        assert_eq!(tree.store().get_root().unwrap(), None);
        assert!(!tree.store().contains(root));
    }

    #[test]
    fn test_update() {
        let mut tree = create_tree(2);
        for k in 1..=5 {
            tree.insert(k).unwrap();
        }

        assert!(tree.update(&3, 30).unwrap());
        assert_eq!(tree.keys().unwrap(), vec![1, 2, 4, 5, 30]);

        assert!(!tree.update(&3, 40).unwrap());
        assert_eq!(tree.keys().unwrap(), vec![1, 2, 4, 5, 30]);
    }

    #[test]
    fn test_update_to_existing_key_loses_old() {
        let mut tree = create_tree(2);
        for k in 1..=5 {
            tree.insert(k).unwrap();
        }

        assert!(tree.update(&2, 4).unwrap());
        assert_eq!(tree.keys().unwrap(), vec![1, 3, 4, 5]);
    }
}

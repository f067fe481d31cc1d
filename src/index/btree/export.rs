//! Nested by-value snapshots of a tree and their JSON form.
//!
//! A [`NodeSnapshot`] embeds children directly instead of referencing them
//! by id, so it is independent of any store:
//!
//! ```json
//! {"leaf": false, "keys": [10], "children": [
//!     {"leaf": true, "keys": [5], "children": []},
//!     {"leaf": true, "keys": [20], "children": []}
//! ]}
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::{Error, NodeId, Result};
use crate::index::btree::{BTree, Node, NodeKey};
use crate::storage::NodeStore;

/// A node and, recursively, its whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot<K> {
    pub leaf: bool,
    pub keys: Vec<K>,
    #[serde(default = "Vec::new")]
    pub children: Vec<NodeSnapshot<K>>,
}

impl<K> NodeSnapshot<K> {
    /// The snapshot of an empty tree: a leaf with no keys.
    pub fn empty() -> Self {
        Self {
            leaf: true,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Whether this snapshot describes an empty tree.
    pub fn is_empty(&self) -> bool {
        self.leaf && self.keys.is_empty() && self.children.is_empty()
    }
}

impl<K: NodeKey, S: NodeStore> BTree<K, S> {
    /// Copy the whole tree into a nested snapshot.
    pub fn export(&mut self) -> Result<NodeSnapshot<K>> {
        match self.root {
            Some(root) => self.export_node(root),
            None => Ok(NodeSnapshot::empty()),
        }
    }

    fn export_node(&mut self, id: NodeId) -> Result<NodeSnapshot<K>> {
        let node = self.cache.load(id)?;
        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            children.push(self.export_node(child)?);
        }
        Ok(NodeSnapshot {
            leaf: node.leaf,
            keys: node.keys,
            children,
        })
    }

    /// Replace the tree's contents with `snapshot`.
    ///
    /// The snapshot's shape is checked first: leaves without children,
    /// `keys + 1` children per internal node, all leaves at one depth, and
    /// every node small enough for the store. A snapshot failing those
    /// checks is rejected before anything is written, and the tree keeps its
    /// contents.
    ///
    /// Otherwise existing nodes are removed and each snapshot node gets a
    /// fresh id from the store. The rebuilt tree is checked before
    /// returning; if the snapshot breaks a key invariant (for example it was
    /// built with a different minimal degree) the tree is cleared and the
    /// violation is returned.
    pub fn import(&mut self, snapshot: &NodeSnapshot<K>) -> Result<()> {
        self.check_snapshot(snapshot, 0, &mut None)?;
        self.clear()?;
        if snapshot.is_empty() {
            return Ok(());
        }

        let built = self
            .import_node(snapshot)
            .and_then(|root| self.set_root(root));
        let checked = built.and_then(|()| self.check_invariants());

        if let Err(e) = checked {
            warn!(error = %e, "rejected snapshot");
            self.clear()?;
            return Err(e);
        }

        debug!(root = ?self.root, "imported snapshot");
        Ok(())
    }

    /// Validate a snapshot subtree without touching the store.
    fn check_snapshot(
        &self,
        snapshot: &NodeSnapshot<K>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> Result<()> {
        let node = if snapshot.leaf {
            if !snapshot.children.is_empty() {
                return Err(Error::invariant("snapshot leaf has children"));
            }
            match *leaf_depth {
                Some(expected) if expected != depth => {
                    return Err(Error::invariant(format!(
                        "snapshot leaves at depths {} and {}",
                        expected, depth
                    )));
                }
                _ => *leaf_depth = Some(depth),
            }
            Node::leaf(NodeId::INVALID, snapshot.keys.clone())
        } else {
            if snapshot.children.len() != snapshot.keys.len() + 1 {
                return Err(Error::invariant(format!(
                    "snapshot node has {} keys but {} children",
                    snapshot.keys.len(),
                    snapshot.children.len()
                )));
            }
            let children = vec![NodeId::INVALID; snapshot.children.len()];
            Node::internal(NodeId::INVALID, snapshot.keys.clone(), children)
        };
        self.cache.check_fits(&[&node])?;

        for child in &snapshot.children {
            self.check_snapshot(child, depth + 1, leaf_depth)?;
        }
        Ok(())
    }

    fn import_node(&mut self, snapshot: &NodeSnapshot<K>) -> Result<NodeId> {
        let mut children = Vec::with_capacity(snapshot.children.len());
        for child in &snapshot.children {
            children.push(self.import_node(child)?);
        }

        let id = self.cache.allocate_id()?;
        let node = if snapshot.leaf {
            Node::leaf(id, snapshot.keys.clone())
        } else {
            Node::internal(id, snapshot.keys.clone(), children)
        };
        self.cache.save(node)?;
        Ok(id)
    }

    /// Remove every node and clear the persisted root pointer.
    ///
    /// Nodes written by an [`import`](Self::import) that hit a store error
    /// before the root pointer was set are unreachable and are not
    /// reclaimed.
    pub fn clear(&mut self) -> Result<()> {
        let Some(root) = self.root else {
            return Ok(());
        };

        self.clear_root()?;
        self.delete_subtree(root)?;
        debug!(old = %root, "cleared tree");
        Ok(())
    }

    fn delete_subtree(&mut self, id: NodeId) -> Result<()> {
        let node = self.cache.load(id)?;
        for &child in &node.children {
            self.delete_subtree(child)?;
        }
        self.cache.delete(id)
    }
}

impl<K, S> BTree<K, S>
where
    K: NodeKey + Serialize + DeserializeOwned,
    S: NodeStore,
{
    /// Write the tree as JSON to `path`.
    pub fn save_json<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let snapshot = self.export()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), "saved tree as json");
        Ok(())
    }

    /// Replace the tree with the JSON snapshot stored at `path`.
    pub fn load_json<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: NodeSnapshot<K> = serde_json::from_reader(reader)?;
        self.import(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TreeConfig;
    use crate::storage::MemoryNodeStore;

    fn create_tree() -> BTree<i64, MemoryNodeStore> {
        let config = TreeConfig::default().with_min_degree(2).with_cache_capacity(8);
        BTree::open(MemoryNodeStore::new(), config).unwrap()
    }

    #[test]
    fn test_export_empty() {
        let mut tree = create_tree();
        assert_eq!(tree.export().unwrap(), NodeSnapshot::empty());
    }

    #[test]
    fn test_export_shape() {
        let mut tree = create_tree();
        for k in 1..=4 {
            tree.insert(k).unwrap();
        }

        let expected = NodeSnapshot {
            leaf: false,
            keys: vec![2],
            children: vec![
                NodeSnapshot { leaf: true, keys: vec![1], children: vec![] },
                NodeSnapshot { leaf: true, keys: vec![3, 4], children: vec![] },
            ],
        };
        assert_eq!(tree.export().unwrap(), expected);
    }

    #[test]
    fn test_json_format() {
        let snapshot = NodeSnapshot { leaf: true, keys: vec![1i64, 2], children: vec![] };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"leaf":true,"keys":[1,2],"children":[]}"#);

        let parsed: NodeSnapshot<i64> = serde_json::from_str(r#"{"leaf":true,"keys":[7]}"#).unwrap();
        assert_eq!(parsed.keys, vec![7]);
    }

    #[test]
    fn test_missing_children_needs_no_default_key() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Tag(u32);

        let parsed: NodeSnapshot<Tag> = serde_json::from_str(r#"{"leaf":true,"keys":[7,9]}"#).unwrap();
        assert_eq!(parsed.keys, vec![Tag(7), Tag(9)]);
        assert!(parsed.children.is_empty());
    }

    #[test]
    fn test_import_replaces_contents() {
        let mut source = create_tree();
        for k in 1..=20 {
            source.insert(k).unwrap();
        }
        let snapshot = source.export().unwrap();

        let mut target = create_tree();
        for k in 100..=110 {
            target.insert(k).unwrap();
        }
        target.import(&snapshot).unwrap();

        assert_eq!(target.keys().unwrap(), (1..=20).collect::<Vec<_>>());
        target.check_invariants().unwrap();
    }

    #[test]
    fn test_import_rejects_bad_snapshot() {
        let mut tree = create_tree();
        let bad = NodeSnapshot {
            leaf: true,
            keys: vec![3i64, 1],
            children: vec![],
        };

        assert!(matches!(tree.import(&bad), Err(Error::InvariantViolation(_))));
        assert!(tree.is_empty());
        assert_eq!(tree.store().get_root().unwrap(), None);
    }

    #[test]
    fn test_import_rejects_wrong_child_count() {
        let mut tree = create_tree();
        let bad = NodeSnapshot {
            leaf: false,
            keys: vec![5i64],
            children: vec![NodeSnapshot { leaf: true, keys: vec![1], children: vec![] }],
        };
        assert!(tree.import(&bad).is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_bad_shape_rejected_before_any_write() {
        let store = MemoryNodeStore::new();
        let config = TreeConfig::default().with_min_degree(2).with_cache_capacity(8);
        let mut tree = BTree::<i64, _>::open(store.clone(), config).unwrap();
        for k in 1..=10 {
            tree.insert(k).unwrap();
        }
        tree.flush().unwrap();
        let nodes = store.len();
        let writes = store.write_count();

        let leaf = |keys: Vec<i64>| NodeSnapshot { leaf: true, keys, children: vec![] };
        // First subtree is well formed; the second has one child too few
        let wrong_count = NodeSnapshot {
            leaf: false,
            keys: vec![10],
            children: vec![
                NodeSnapshot { leaf: false, keys: vec![2], children: vec![leaf(vec![1]), leaf(vec![3])] },
                NodeSnapshot { leaf: false, keys: vec![20, 30], children: vec![leaf(vec![11]), leaf(vec![25])] },
            ],
        };
        let uneven = NodeSnapshot {
            leaf: false,
            keys: vec![10],
            children: vec![
                NodeSnapshot { leaf: false, keys: vec![2], children: vec![leaf(vec![1]), leaf(vec![3])] },
                leaf(vec![11]),
            ],
        };

        for bad in [wrong_count, uneven] {
            assert!(matches!(tree.import(&bad), Err(Error::InvariantViolation(_))));
            tree.flush().unwrap();
            assert_eq!(tree.keys().unwrap(), (1..=10).collect::<Vec<_>>());
            assert_eq!(store.len(), nodes);
            assert_eq!(store.write_count(), writes);
        }
    }

    #[test]
    fn test_clear_removes_nodes() {
        let store = MemoryNodeStore::new();
        let config = TreeConfig::default().with_min_degree(2).with_cache_capacity(8);
        let mut tree = BTree::<i64, _>::open(store.clone(), config).unwrap();
        for k in 1..=30 {
            tree.insert(k).unwrap();
        }
        tree.flush().unwrap();
        assert!(!store.is_empty());

        tree.clear().unwrap();
        assert!(tree.is_empty());
        assert!(store.is_empty());
        assert_eq!(store.get_root().unwrap(), None);
    }
}

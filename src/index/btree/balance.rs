//! Structural rebalancing: split, merge and key rotation.
//!
//! Each operation works on an owned copy of the parent plus freshly loaded
//! children, and saves every node it changes before returning. All changed
//! nodes are size-checked before the first save, so a node that would not
//! fit in the store leaves the tree and the caller's `parent` untouched.
//! Nodes are written before anything that could make them unreachable is
//! removed.

use std::mem;

use tracing::trace;

use crate::common::{Error, NodeId, Result};
use crate::index::btree::{BTree, Node, NodeKey};
use crate::storage::NodeStore;

impl<K: NodeKey, S: NodeStore> BTree<K, S> {
    /// Split the full child at `parent.children[i]`.
    ///
    /// The child keeps its lower `t - 1` keys, a new right sibling takes the
    /// upper `t - 1`, and the median moves up into `parent.keys[i]`.
    pub(super) fn split_child(&mut self, parent: &mut Node<K>, i: usize) -> Result<()> {
        let t = self.min_degree;
        let child_id = parent.child(i)?;
        let mut child = self.cache.load(child_id)?;

        if !child.is_full(t) {
            return Err(Error::invariant(format!("split of non-full {}", child_id)));
        }

        // Sibling id is fixed-width, so a placeholder sizes it correctly
        let mut sibling = Node::new(NodeId::INVALID, child.is_leaf());
        sibling.keys = child.keys.split_off(t);
        let median = child
            .keys
            .pop()
            .ok_or_else(|| Error::invariant(format!("{} has no median", child_id)))?;
        if !child.is_leaf() {
            sibling.children = child.children.split_off(t);
        }

        let mut new_parent = parent.clone();
        new_parent.keys.insert(i, median);
        new_parent.children.insert(i + 1, NodeId::INVALID);
        self.cache.check_fits(&[&child, &sibling, &new_parent])?;

        let sibling_id = self.cache.allocate_id()?;
        sibling.id = sibling_id;
        new_parent.children[i + 1] = sibling_id;

        trace!(parent = %parent.id, child = %child_id, sibling = %sibling_id, "split");

        self.cache.save(child)?;
        self.cache.save(sibling)?;
        self.cache.save(new_parent.clone())?;
        *parent = new_parent;
        Ok(())
    }

    /// Fold `parent.keys[i]` and the child at `i + 1` into the child at `i`.
    ///
    /// The right child is deleted once the merged node and the parent are
    /// saved.
    pub(super) fn merge(&mut self, parent: &mut Node<K>, i: usize) -> Result<()> {
        let left_id = parent.child(i)?;
        let right_id = parent.child(i + 1)?;
        let mut left = self.cache.load(left_id)?;
        let right = self.cache.load(right_id)?;

        if left.is_leaf() != right.is_leaf() {
            return Err(Error::invariant(format!(
                "merge of {} and {} at different depths",
                left_id, right_id
            )));
        }

        let mut new_parent = parent.clone();
        let separator = new_parent.keys.remove(i);
        new_parent.children.remove(i + 1);

        left.keys.push(separator);
        left.keys.extend(right.keys);
        left.children.extend(right.children);
        self.cache.check_fits(&[&left, &new_parent])?;

        trace!(parent = %parent.id, left = %left_id, right = %right_id, "merge");

        self.cache.save(left)?;
        self.cache.save(new_parent.clone())?;
        *parent = new_parent;
        self.cache.delete(right_id)
    }

    /// Rotate the last key of the left sibling through the parent into the
    /// front of `parent.children[i]`.
    pub(super) fn borrow_from_prev(&mut self, parent: &mut Node<K>, i: usize) -> Result<()> {
        let sep = i
            .checked_sub(1)
            .ok_or_else(|| Error::invariant("borrow from the left of child 0"))?;
        let child_id = parent.child(i)?;
        let sibling_id = parent.child(sep)?;
        let mut child = self.cache.load(child_id)?;
        let mut sibling = self.cache.load(sibling_id)?;

        let borrowed = sibling
            .keys
            .pop()
            .ok_or_else(|| Error::invariant(format!("{} has no key to lend", sibling_id)))?;
        let mut new_parent = parent.clone();
        let separator = mem::replace(&mut new_parent.keys[sep], borrowed);
        child.keys.insert(0, separator);

        if !child.is_leaf() {
            let moved = sibling
                .children
                .pop()
                .ok_or_else(|| Error::invariant(format!("{} has no child to lend", sibling_id)))?;
            child.children.insert(0, moved);
        }
        self.cache.check_fits(&[&sibling, &child, &new_parent])?;

        trace!(parent = %parent.id, from = %sibling_id, to = %child_id, "borrow from prev");

        self.cache.save(sibling)?;
        self.cache.save(child)?;
        self.cache.save(new_parent.clone())?;
        *parent = new_parent;
        Ok(())
    }

    /// Rotate the first key of the right sibling through the parent onto the
    /// end of `parent.children[i]`.
    pub(super) fn borrow_from_next(&mut self, parent: &mut Node<K>, i: usize) -> Result<()> {
        let child_id = parent.child(i)?;
        let sibling_id = parent.child(i + 1)?;
        let mut child = self.cache.load(child_id)?;
        let mut sibling = self.cache.load(sibling_id)?;

        if sibling.keys.is_empty() {
            return Err(Error::invariant(format!("{} has no key to lend", sibling_id)));
        }
        let borrowed = sibling.keys.remove(0);
        let mut new_parent = parent.clone();
        let separator = mem::replace(&mut new_parent.keys[i], borrowed);
        child.keys.push(separator);

        if !child.is_leaf() {
            if sibling.children.is_empty() {
                return Err(Error::invariant(format!("{} has no child to lend", sibling_id)));
            }
            child.children.push(sibling.children.remove(0));
        }
        self.cache.check_fits(&[&sibling, &child, &new_parent])?;

        trace!(parent = %parent.id, from = %sibling_id, to = %child_id, "borrow from next");

        self.cache.save(sibling)?;
        self.cache.save(child)?;
        self.cache.save(new_parent.clone())?;
        *parent = new_parent;
        Ok(())
    }

    /// Top up `parent.children[i]` to at least `t` keys.
    ///
    /// Prefers borrowing from the left sibling, then the right, then merges.
    /// Returns the index of the child that now covers the original range,
    /// which is `i - 1` when the last child had to merge leftward.
    pub(super) fn fill(&mut self, parent: &mut Node<K>, i: usize) -> Result<usize> {
        let t = self.min_degree;

        if i > 0 && self.cache.load(parent.child(i - 1)?)?.key_count() >= t {
            self.borrow_from_prev(parent, i)?;
            return Ok(i);
        }
        if i < parent.key_count() && self.cache.load(parent.child(i + 1)?)?.key_count() >= t {
            self.borrow_from_next(parent, i)?;
            return Ok(i);
        }

        if i < parent.key_count() {
            self.merge(parent, i)?;
            Ok(i)
        } else {
            let left = i
                .checked_sub(1)
                .ok_or_else(|| Error::invariant(format!("{} has a single child", parent.id)))?;
            self.merge(parent, left)?;
            Ok(left)
        }
    }
}

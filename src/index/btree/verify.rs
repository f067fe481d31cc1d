//! Structural inspection: height, per-level dumps and invariant checking.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::common::{Error, NodeId, Result};
use crate::index::btree::{BTree, NodeKey};
use crate::storage::NodeStore;

impl<K: NodeKey, S: NodeStore> BTree<K, S> {
    /// Number of levels; a lone leaf root has height 1, an empty tree 0.
    pub fn height(&mut self) -> Result<usize> {
        let Some(mut current) = self.root else {
            return Ok(0);
        };

        let mut height = 1;
        loop {
            let node = self.cache.load(current)?;
            if node.is_leaf() {
                return Ok(height);
            }
            current = node.child(0)?;
            height += 1;
        }
    }

    /// Key lists of every node, grouped by level from the root down.
    pub fn levels(&mut self) -> Result<Vec<Vec<Vec<K>>>> {
        let mut levels = Vec::new();
        let mut frontier: Vec<NodeId> = self.root.into_iter().collect();

        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next = Vec::new();
            for id in frontier {
                let node = self.cache.load(id)?;
                next.extend_from_slice(node.children());
                level.push(node.keys);
            }
            levels.push(level);
            frontier = next;
        }

        Ok(levels)
    }

    /// Human-readable rendering, one line per level.
    ///
    /// ```text
    /// L0: [10, 20]
    /// L1: [5, 6, 7] [12, 17] [30]
    /// ```
    pub fn dump(&mut self) -> Result<String> {
        let mut out = String::new();
        for (depth, level) in self.levels()?.iter().enumerate() {
            let _ = write!(out, "L{}:", depth);
            for keys in level {
                let _ = write!(out, " {:?}", keys);
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// Walk the whole tree and verify its structural invariants.
    ///
    /// Checks key counts against the degree bounds, strict ordering within
    /// and across nodes, child counts, equal leaf depth, and that no node
    /// is reachable twice.
    ///
    /// # Errors
    /// Returns `Error::InvariantViolation` describing the first breach, or
    /// any error raised while loading nodes.
    pub fn check_invariants(&mut self) -> Result<()> {
        let Some(root) = self.root else {
            return Ok(());
        };

        let mut walk = Walk {
            leaf_depth: None,
            seen: HashSet::new(),
        };
        self.check_node(root, 0, None, None, &mut walk)
    }

    fn check_node(
        &mut self,
        id: NodeId,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        walk: &mut Walk,
    ) -> Result<()> {
        if !walk.seen.insert(id) {
            return Err(Error::invariant(format!("{} is reachable twice", id)));
        }

        let t = self.min_degree;
        let node = self.cache.load(id)?;
        let count = node.key_count();

        let min = if depth == 0 { 1 } else { t - 1 };
        if count < min || count > 2 * t - 1 {
            return Err(Error::invariant(format!(
                "{} holds {} keys, expected {}..={}",
                id,
                count,
                min,
                2 * t - 1
            )));
        }

        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invariant(format!("{} keys out of order", id)));
        }
        if let (Some(lo), Some(first)) = (lower, node.keys.first()) {
            if first <= lo {
                return Err(Error::invariant(format!("{} key {:?} not above {:?}", id, first, lo)));
            }
        }
        if let (Some(hi), Some(last)) = (upper, node.keys.last()) {
            if last >= hi {
                return Err(Error::invariant(format!("{} key {:?} not below {:?}", id, last, hi)));
            }
        }

        if node.is_leaf() {
            if !node.children.is_empty() {
                return Err(Error::invariant(format!("leaf {} has children", id)));
            }
            return match walk.leaf_depth {
                None => {
                    walk.leaf_depth = Some(depth);
                    Ok(())
                }
                Some(d) if d == depth => Ok(()),
                Some(d) => Err(Error::invariant(format!(
                    "leaf {} at depth {}, expected {}",
                    id, depth, d
                ))),
            };
        }

        if node.children.len() != count + 1 {
            return Err(Error::invariant(format!(
                "{} has {} keys but {} children",
                id,
                count,
                node.children.len()
            )));
        }

        for (i, &child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { node.keys.get(i - 1) };
            let hi = node.keys.get(i).or(upper);
            self.check_node(child, depth + 1, lo, hi, walk)?;
        }
        Ok(())
    }
}

struct Walk {
    leaf_depth: Option<usize>,
    seen: HashSet<NodeId>,
}

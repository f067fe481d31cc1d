//! Node Cache - the bounded layer between the B-tree and its node store.
//!
//! The [`NodeCache`] provides:
//! - Decoded nodes served from memory, loaded from the store on a miss
//! - Dirty tracking with write-back on eviction
//! - FIFO eviction once more than `capacity` nodes are resident

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::CacheStats;
use crate::common::{Error, NodeId, Result};
use crate::index::btree::{Node, NodeKey};
use crate::storage::NodeStore;

/// A resident node and whether it differs from the store's copy.
struct CachedNode<K> {
    node: Node<K>,
    dirty: bool,
}

/// Bounded map from node id to decoded node, backed by a [`NodeStore`].
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────┐
/// │                     NodeCache                      │
/// │  ┌───────────────────────┐   ┌──────────────────┐  │
/// │  │ nodes                 │   │ replacer         │  │
/// │  │ NodeId → (Node, dirty)│   │ FifoReplacer     │  │
/// │  └───────────────────────┘   └──────────────────┘  │
/// │              │ miss / flush                        │
/// │              ▼                                     │
/// │  ┌──────────────────────────────────────────────┐  │
/// │  │ store: S (NodeStore)                         │  │
/// │  └──────────────────────────────────────────────┘  │
/// └────────────────────────────────────────────────────┘
/// ```
///
/// `load` hands out owned copies, so callers never hold a borrow into the
/// cache across another cache call. Any `load` or `save` may synchronously
/// write back a *different* node when it pushes residency over capacity.
/// A dirty node is always written before it leaves memory.
///
/// # Usage
/// ```
/// use pagetree::buffer::NodeCache;
/// use pagetree::index::btree::Node;
/// use pagetree::storage::MemoryNodeStore;
///
/// let mut cache = NodeCache::<u64, _>::new(MemoryNodeStore::new(), 2).unwrap();
/// let id = cache.allocate_id().unwrap();
/// cache.save(Node::leaf(id, vec![1, 2, 3])).unwrap();
/// assert_eq!(cache.load(id).unwrap().keys(), &[1, 2, 3]);
/// ```
pub struct NodeCache<K: NodeKey, S: NodeStore> {
    nodes: HashMap<NodeId, CachedNode<K>>,
    replacer: FifoReplacer,
    store: S,
    stats: CacheStats,
    capacity: usize,
}

impl<K: NodeKey, S: NodeStore> NodeCache<K, S> {
    /// Create a cache holding at most `capacity` resident nodes.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `capacity` is 0.
    pub fn new(store: S, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("cache capacity must be > 0".to_string()));
        }

        Ok(Self {
            nodes: HashMap::with_capacity(capacity + 1),
            replacer: FifoReplacer::new(),
            store,
            stats: CacheStats::default(),
            capacity,
        })
    }

    /// Reserve an identifier for a node about to be created.
    pub fn allocate_id(&mut self) -> Result<NodeId> {
        self.store.allocate()
    }

    /// Get a copy of a node.
    ///
    /// # Errors
    /// - `Error::NodeNotFound` if neither the cache nor the store has `id`
    /// - Store and decode errors on a miss
    /// - Write-back errors if admitting the node forces an eviction
    pub fn load(&mut self, id: NodeId) -> Result<Node<K>> {
        if let Some(entry) = self.nodes.get(&id) {
            self.stats.cache_hits += 1;
            return Ok(entry.node.clone());
        }

        self.stats.cache_misses += 1;
        let bytes = self.store.get(id)?.ok_or(Error::NodeNotFound(id))?;
        self.stats.nodes_read += 1;

        let node = Node::decode(&bytes, id)?;
        self.nodes.insert(
            id,
            CachedNode {
                node: node.clone(),
                dirty: false,
            },
        );
        self.replacer.record_access(id);
        self.evict_if_over_capacity()?;

        Ok(node)
    }

    /// Make `node` resident and dirty, replacing any cached copy.
    ///
    /// A node that is already resident keeps its eviction position.
    ///
    /// # Errors
    /// - `Error::NodeTooLarge` if the store cannot hold the encoded node
    /// - Write-back errors from an eviction this save triggers
    pub fn save(&mut self, node: Node<K>) -> Result<()> {
        let id = node.id();
        self.check_fits(&[&node])?;

        self.nodes.insert(id, CachedNode { node, dirty: true });
        self.replacer.record_access(id);
        self.evict_if_over_capacity()?;
        Ok(())
    }

    /// Check that every node in `nodes` would fit in one store record.
    ///
    /// Nothing is written. Structural changes that rewrite several nodes
    /// call this first so a rejected node cannot leave the others saved.
    ///
    /// # Errors
    /// `Error::NodeTooLarge` for the first node that does not fit.
    pub fn check_fits(&self, nodes: &[&Node<K>]) -> Result<()> {
        let Some(max) = self.store.max_record_size() else {
            return Ok(());
        };

        for node in nodes {
            let size = node.encode()?.len();
            if size > max {
                return Err(Error::NodeTooLarge {
                    id: node.id(),
                    size,
                    capacity: max,
                });
            }
        }
        Ok(())
    }

    /// Evict oldest-admitted nodes until residency is within capacity.
    ///
    /// Dirty victims are written to the store first. Returns how many nodes
    /// were evicted.
    pub fn evict_if_over_capacity(&mut self) -> Result<usize> {
        let mut evicted = 0;

        while self.nodes.len() > self.capacity {
            let victim = self
                .replacer
                .peek()
                .ok_or_else(|| Error::invariant("node cache over capacity with nothing to evict"))?;

            // Victim stays resident and queued if the write-back fails
            self.flush(victim)?;
            self.replacer.evict();
            self.nodes.remove(&victim);
            self.stats.evictions += 1;
            evicted += 1;
            trace!(id = %victim, resident = self.nodes.len(), "evicted node");
        }

        Ok(evicted)
    }

    /// Drop a node from the cache and the store.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        self.nodes.remove(&id);
        self.replacer.remove(id);
        self.store.remove(id)?;
        trace!(%id, "deleted node");
        Ok(())
    }

    /// Write one node back to the store if it is resident and dirty.
    pub fn flush(&mut self, id: NodeId) -> Result<()> {
        let Some(entry) = self.nodes.get_mut(&id) else {
            return Ok(());
        };
        if !entry.dirty {
            return Ok(());
        }

        let bytes = entry.node.encode()?;
        self.store.put(id, &bytes)?;
        entry.dirty = false;
        self.stats.nodes_written += 1;
        trace!(%id, bytes = bytes.len(), "flushed node");
        Ok(())
    }

    /// Write every dirty node back to the store and sync it.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut dirty: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(&id, _)| id)
            .collect();
        dirty.sort();

        for id in dirty {
            self.flush(id)?;
        }

        self.store.sync()
    }

    /// Whether `id` is currently held in memory.
    pub fn is_resident(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `id` is resident with unwritten changes.
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|entry| entry.dirty)
    }

    /// Number of resident nodes.
    pub fn resident_count(&self) -> usize {
        self.nodes.len()
    }

    /// Maximum resident nodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<K: NodeKey, S: NodeStore> Drop for NodeCache<K, S> {
    fn drop(&mut self) {
        if self.nodes.values().any(|entry| entry.dirty) {
            if let Err(e) = self.flush_all() {
                warn!(error = %e, "failed to flush dirty nodes while dropping cache");
            }
        }
    }
}

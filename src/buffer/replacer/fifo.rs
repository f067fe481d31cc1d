//! FIFO (First-In-First-Out) replacement policy.
//!
//! Victims are chosen in the order nodes became resident. Re-saving or
//! re-loading a resident node does not move it; this is insertion order,
//! not LRU.

use std::collections::{HashMap, VecDeque};

use crate::common::NodeId;

/// A FIFO eviction policy over resident node ids.
///
/// Removal is lazy: `remove()` drops the id from the live map and leaves
/// its queue entry behind. Each entry carries the sequence number it was
/// admitted with, so a stale entry is skipped even if the same id has been
/// admitted again since. Once stale entries outnumber live ones the queue
/// is compacted, so it stays within `2 * size() + COMPACT_SLACK` entries.
pub struct FifoReplacer {
    /// Admission order (front = oldest), with admission sequence numbers.
    queue: VecDeque<(NodeId, u64)>,

    /// Live ids and the sequence number of their current admission.
    live: HashMap<NodeId, u64>,

    next_seq: u64,
}

impl FifoReplacer {
    /// Stale entries tolerated on top of the live count before compacting.
    pub const COMPACT_SLACK: usize = 16;

    /// Create a new FIFO replacer.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Record that a node is resident.
    ///
    /// Only admits the id if it is not already tracked.
    pub fn record_access(&mut self, id: NodeId) {
        if self.live.contains_key(&id) {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back((id, seq));
        self.live.insert(id, seq);
    }

    /// Select and forget the oldest tracked node.
    pub fn evict(&mut self) -> Option<NodeId> {
        while let Some((id, seq)) = self.queue.pop_front() {
            if self.live.get(&id) == Some(&seq) {
                self.live.remove(&id);
                return Some(id);
            }
        }
        None
    }

    /// The node `evict()` would return next, without forgetting it.
    pub fn peek(&mut self) -> Option<NodeId> {
        while let Some(&(id, seq)) = self.queue.front() {
            if self.live.get(&id) == Some(&seq) {
                return Some(id);
            }
            self.queue.pop_front();
        }
        None
    }

    /// Stop tracking a node (it was deleted).
    pub fn remove(&mut self, id: NodeId) {
        if self.live.remove(&id).is_none() {
            return;
        }
        if self.queue.len() > 2 * self.live.len() + Self::COMPACT_SLACK {
            let live = &self.live;
            self.queue.retain(|(id, seq)| live.get(id) == Some(seq));
        }
    }

    /// Whether a node is tracked.
    pub fn contains(&self, id: NodeId) -> bool {
        self.live.contains_key(&id)
    }

    /// Number of tracked nodes.
    pub fn size(&self) -> usize {
        self.live.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> NodeId {
        NodeId::new(n)
    }

    #[test]
    fn test_fifo_basic() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(id(0));
        replacer.record_access(id(1));
        replacer.record_access(id(2));
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(id(0)));
        assert_eq!(replacer.evict(), Some(id(1)));
        assert_eq!(replacer.evict(), Some(id(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_remove() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(id(0));
        replacer.record_access(id(1));
        replacer.remove(id(0));

        assert!(!replacer.contains(id(0)));
        assert_eq!(replacer.evict(), Some(id(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_reaccess_no_reorder() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(id(0));
        replacer.record_access(id(1));
        replacer.record_access(id(0));

        assert_eq!(replacer.evict(), Some(id(0)));
        assert_eq!(replacer.evict(), Some(id(1)));
    }

    #[test]
    fn test_queue_bounded_under_churn() {
        let mut replacer = FifoReplacer::new();
        replacer.record_access(id(0));
        replacer.record_access(id(1));

        for n in 0..100_000 {
            replacer.record_access(id(n + 2));
            replacer.remove(id(n + 2));
            assert!(replacer.queue.len() <= 2 * replacer.size() + FifoReplacer::COMPACT_SLACK);
        }

        // Compaction keeps the survivors in admission order
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(id(0)));
        assert_eq!(replacer.evict(), Some(id(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_readmitted_id_goes_to_back() {
        let mut replacer = FifoReplacer::new();

        replacer.record_access(id(0));
        replacer.record_access(id(1));
        replacer.remove(id(0));
        replacer.record_access(id(0));

        // The stale front entry for 0 must not be taken as its new position
        assert_eq!(replacer.peek(), Some(id(1)));
        assert_eq!(replacer.evict(), Some(id(1)));
        assert_eq!(replacer.evict(), Some(id(0)));
        assert_eq!(replacer.evict(), None);
    }
}

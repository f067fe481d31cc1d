//! Node identifier type.

use std::fmt;

use crate::common::PageId;

/// Identifies a B-tree node in the node store.
///
/// Child links inside the tree are `NodeId`s resolved through the node
/// cache, never in-memory references. An id is assigned when the node is
/// created and never changes; it is never reused while the node is alive.
///
/// In the file-backed store a node id is the number of the page that
/// holds the node.
///
/// # Example
/// ```
/// use pagetree::NodeId;
///
/// let id = NodeId::new(42);
/// assert!(id.is_valid());
/// assert_eq!(id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel meaning "no node" in on-disk encodings.
    pub const INVALID: NodeId = NodeId(u32::MAX);

    /// Create a new NodeId.
    #[inline]
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Check if this node ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Encode an optional id, mapping `None` to the sentinel.
    #[inline]
    pub fn to_raw(id: Option<NodeId>) -> u32 {
        id.unwrap_or(Self::INVALID).0
    }

    /// Decode a raw id, mapping the sentinel to `None`.
    #[inline]
    pub fn from_raw(raw: u32) -> Option<NodeId> {
        let id = NodeId(raw);
        id.is_valid().then_some(id)
    }
}

impl From<PageId> for NodeId {
    fn from(page_id: PageId) -> Self {
        NodeId(page_id.0)
    }
}

impl From<NodeId> for PageId {
    fn from(node_id: NodeId) -> Self {
        PageId(node_id.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Node(INVALID)")
        } else {
            write!(f, "Node({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_new() {
        let id = NodeId::new(42);
        assert_eq!(id.0, 42);
        assert!(id.is_valid());
    }

    #[test]
    fn test_node_id_invalid() {
        assert!(!NodeId::INVALID.is_valid());
        assert_eq!(NodeId::INVALID.0, u32::MAX);
    }

    #[test]
    fn test_raw_roundtrip() {
        assert_eq!(NodeId::to_raw(None), u32::MAX);
        assert_eq!(NodeId::from_raw(u32::MAX), None);
        assert_eq!(NodeId::from_raw(NodeId::to_raw(Some(NodeId::new(9)))), Some(NodeId::new(9)));
    }

    #[test]
    fn test_page_id_conversion() {
        let page: PageId = NodeId::new(5).into();
        assert_eq!(page, PageId::new(5));
        assert_eq!(NodeId::from(page), NodeId::new(5));
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(format!("{}", NodeId::new(42)), "Node(42)");
        assert_eq!(format!("{}", NodeId::INVALID), "Node(INVALID)");
    }
}

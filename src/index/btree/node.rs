//! B-tree node representation and its by-identifier record format.
//!
//! # Record Layout
//! ```text
//! Offset  Size              Field
//! ------  ----              -----
//! 0       4                 id (u32, little-endian)
//! 4       1                 leaf (0 or 1)
//! 5       2                 key_count (u16, little-endian)
//! 7       variable          keys (NodeKey encoding, key_count entries)
//! ...     4 × (n + 1)       children (internal nodes only)
//! ```

use std::fmt;

use crate::common::{Error, NodeId, Result};

/// A key type the tree can store.
///
/// Keys need a total order and a self-delimiting binary encoding for node
/// records. Implemented for the fixed-width integers, `String` and
/// `Vec<u8>`.
pub trait NodeKey: Ord + Clone + fmt::Debug {
    /// Append the encoded key to `buf`.
    ///
    /// # Errors
    /// Returns `Error::Codec` if the key cannot be represented.
    fn encode_key(&self, buf: &mut Vec<u8>) -> Result<()>;

    /// Decode one key from the front of `buf`, returning it and the number
    /// of bytes consumed.
    fn decode_key(buf: &[u8]) -> Result<(Self, usize)>;

    /// Encoded size of every key of this type, if it is fixed.
    ///
    /// Variable-length keys return `None`; their nodes are only size-checked
    /// when written.
    const ENCODED_WIDTH: Option<usize> = None;
}

macro_rules! impl_int_key {
    ($($t:ty),*) => {
        $(
            impl NodeKey for $t {
                const ENCODED_WIDTH: Option<usize> = Some(std::mem::size_of::<$t>());

                fn encode_key(&self, buf: &mut Vec<u8>) -> Result<()> {
                    buf.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn decode_key(buf: &[u8]) -> Result<(Self, usize)> {
                    const WIDTH: usize = std::mem::size_of::<$t>();
                    let bytes: [u8; WIDTH] = buf
                        .get(..WIDTH)
                        .and_then(|b| b.try_into().ok())
                        .ok_or_else(|| Error::codec(concat!("truncated ", stringify!($t), " key")))?;
                    Ok((<$t>::from_le_bytes(bytes), WIDTH))
                }
            }
        )*
    };
}

impl_int_key!(u32, u64, i32, i64);

fn encode_len_prefix(len: usize, buf: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| Error::codec(format!("key of {} bytes is too long to encode", len)))?;
    len.encode_key(buf)
}

fn decode_len_prefixed(buf: &[u8]) -> Result<(&[u8], usize)> {
    let (len, _) = u32::decode_key(buf)?;
    let end = 4 + len as usize;
    let body = buf
        .get(4..end)
        .ok_or_else(|| Error::codec("truncated length-prefixed key"))?;
    Ok((body, end))
}

impl NodeKey for Vec<u8> {
    fn encode_key(&self, buf: &mut Vec<u8>) -> Result<()> {
        encode_len_prefix(self.len(), buf)?;
        buf.extend_from_slice(self);
        Ok(())
    }

    fn decode_key(buf: &[u8]) -> Result<(Self, usize)> {
        let (body, used) = decode_len_prefixed(buf)?;
        Ok((body.to_vec(), used))
    }
}

impl NodeKey for String {
    fn encode_key(&self, buf: &mut Vec<u8>) -> Result<()> {
        encode_len_prefix(self.len(), buf)?;
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode_key(buf: &[u8]) -> Result<(Self, usize)> {
        let (body, used) = decode_len_prefixed(buf)?;
        let s = std::str::from_utf8(body).map_err(|e| Error::codec(format!("invalid utf-8 key: {}", e)))?;
        Ok((s.to_string(), used))
    }
}

/// A B-tree node.
///
/// Children are referenced by [`NodeId`] and resolved through the node
/// cache. For an internal node `children.len() == keys.len() + 1`; leaves
/// have no children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<K> {
    pub(crate) id: NodeId,
    pub(crate) leaf: bool,
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<NodeId>,
}

impl<K> Node<K> {
    const FIXED_SIZE: usize = 7;

    /// Create an empty node.
    pub fn new(id: NodeId, leaf: bool) -> Self {
        Self {
            id,
            leaf,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a leaf holding `keys`.
    pub fn leaf(id: NodeId, keys: Vec<K>) -> Self {
        Self {
            id,
            leaf: true,
            keys,
            children: Vec::new(),
        }
    }

    /// Create an internal node.
    pub fn internal(id: NodeId, keys: Vec<K>, children: Vec<NodeId>) -> Self {
        Self {
            id,
            leaf: false,
            keys,
            children,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Mutable access to the keys. Callers keep them sorted.
    #[inline]
    pub fn keys_mut(&mut self) -> &mut Vec<K> {
        &mut self.keys
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Whether the node holds the maximum `2t - 1` keys.
    #[inline]
    pub fn is_full(&self, min_degree: usize) -> bool {
        self.keys.len() >= 2 * min_degree - 1
    }

    /// Child at `index`, or an invariant violation naming this node.
    pub(crate) fn child(&self, index: usize) -> Result<NodeId> {
        self.children.get(index).copied().ok_or_else(|| {
            Error::invariant(format!(
                "{} has no child at index {} ({} children)",
                self.id,
                index,
                self.children.len()
            ))
        })
    }
}

impl<K: Ord> Node<K> {
    /// Index of the first key `>= key` (equals `key_count()` if none).
    #[inline]
    pub fn find_index(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Whether `keys[index]` equals `key`.
    #[inline]
    pub(crate) fn key_matches(&self, index: usize, key: &K) -> bool {
        self.keys.get(index) == Some(key)
    }
}

impl<K: NodeKey> Node<K> {
    /// Record size of a full node (`2t - 1` keys, `2t` children) when `K`
    /// has a fixed width, `None` otherwise.
    pub fn max_encoded_len(min_degree: usize) -> Option<usize> {
        let width = K::ENCODED_WIDTH?;
        let children = min_degree.saturating_mul(2);
        let keys = children.checked_sub(1)?;
        Some(
            keys.saturating_mul(width)
                .saturating_add(children.saturating_mul(4))
                .saturating_add(Self::FIXED_SIZE),
        )
    }

    /// Encode into the by-identifier record format.
    ///
    /// # Errors
    /// Returns `Error::Codec` if the node holds more keys than a record can
    /// describe.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key_count = u16::try_from(self.keys.len())
            .map_err(|_| Error::codec(format!("{} has too many keys to encode", self.id)))?;

        let mut buf = Vec::with_capacity(Self::FIXED_SIZE + self.keys.len() * 8 + self.children.len() * 4);
        buf.extend_from_slice(&self.id.0.to_le_bytes());
        buf.push(self.leaf as u8);
        buf.extend_from_slice(&key_count.to_le_bytes());

        for key in &self.keys {
            key.encode_key(&mut buf)?;
        }
        if !self.leaf {
            for child in &self.children {
                buf.extend_from_slice(&child.0.to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Decode a record that the store returned for `expected`.
    ///
    /// # Errors
    /// Returns `Error::Codec` for malformed bytes and
    /// `Error::InvariantViolation` if the record belongs to another node.
    pub fn decode(bytes: &[u8], expected: NodeId) -> Result<Self> {
        if bytes.len() < Self::FIXED_SIZE {
            return Err(Error::codec(format!("record for {} is truncated", expected)));
        }

        let (raw_id, _) = u32::decode_key(bytes)?;
        let id = NodeId::new(raw_id);
        if id != expected {
            return Err(Error::invariant(format!(
                "store returned {} when asked for {}",
                id, expected
            )));
        }

        let leaf = match bytes[4] {
            0 => false,
            1 => true,
            other => return Err(Error::codec(format!("bad leaf flag {} in {}", other, id))),
        };
        let key_count = u16::from_le_bytes([bytes[5], bytes[6]]) as usize;

        let mut offset = Self::FIXED_SIZE;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let (key, used) = K::decode_key(&bytes[offset..])?;
            keys.push(key);
            offset += used;
        }

        let mut children = Vec::new();
        if !leaf {
            children.reserve(key_count + 1);
            for _ in 0..=key_count {
                let (raw, used) = u32::decode_key(&bytes[offset..])?;
                children.push(NodeId::new(raw));
                offset += used;
            }
        }

        if offset != bytes.len() {
            return Err(Error::codec(format!(
                "{} trailing bytes after record for {}",
                bytes.len() - offset,
                id
            )));
        }

        Ok(Self {
            id,
            leaf,
            keys,
            children,
        })
    }
}

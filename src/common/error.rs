//! Error types for pagetree.

use thiserror::Error;

use crate::common::NodeId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagetree.
///
/// A key that is simply absent is never an error: `search`, `delete` and
/// `update` report it through `Option`/`bool`. Everything here is fatal to
/// the operation that raised it and is propagated without retry.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the node store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Page contents failed validation (checksum, magic, layout).
    #[error("Corrupted page {page}: {reason}")]
    Corrupted { page: u32, reason: String },

    /// A child reference resolved to no node in cache or store.
    ///
    /// Indicates a broken tree, never an absent key.
    #[error("{0} not found in cache or store")]
    NodeNotFound(NodeId),

    /// The tree structure broke one of its invariants.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An encoded node does not fit in one page.
    #[error("{id} encodes to {size} bytes, page payload holds {capacity}")]
    NodeTooLarge {
        id: NodeId,
        size: usize,
        capacity: usize,
    },

    /// Rejected tree or cache settings.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node record could not be decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Whole-tree export/import failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvariantViolation`].
    pub fn invariant(reason: impl Into<String>) -> Self {
        Error::InvariantViolation(reason.into())
    }

    /// Shorthand for an [`Error::Codec`].
    pub fn codec(reason: impl Into<String>) -> Self {
        Error::Codec(reason.into())
    }
}

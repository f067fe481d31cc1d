//! Common types and utilities shared across pagetree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TreeConfig`](config::TreeConfig)
//! - Error types
//! - Identifiers (NodeId, PageId)

pub mod config;
pub mod error;
mod node_id;
mod page_id;

pub use config::TreeConfig;
pub use error::{Error, Result};
pub use node_id::NodeId;
pub use page_id::PageId;

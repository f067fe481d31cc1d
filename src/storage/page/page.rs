//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Each page carries a [`PageHeader`] followed by
//! a variable-length payload (a node record, the meta block, or a free-list
//! link).

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// # Memory Layout
/// - Size: 4096 bytes (4KB)
/// - Alignment: 4096 bytes (for efficient Direct I/O with O_DIRECT)
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code (copying 4KB should
/// be explicit). A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use pagetree::storage::page::{Page, PageType};
///
/// let mut page = Page::new();
/// page.set_payload(PageType::Node, b"abc").unwrap();
/// assert_eq!(page.payload(), b"abc");
/// assert!(page.verify_checksum());
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Maximum payload bytes that fit after the header.
    pub const PAYLOAD_CAPACITY: usize = PAGE_SIZE - PageHeader::SIZE;

    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::decode(&self.data)
    }

    /// Type of this page.
    #[inline]
    pub fn page_type(&self) -> PageType {
        self.header().page_type
    }

    /// Payload bytes following the header.
    ///
    /// A length field larger than the page is clamped; checksum
    /// verification catches such pages before their payload is trusted.
    pub fn payload(&self) -> &[u8] {
        let len = (self.header().payload_len as usize).min(Self::PAYLOAD_CAPACITY);
        &self.data[PageHeader::SIZE..PageHeader::SIZE + len]
    }

    /// Replace the page contents with a typed payload and seal the checksum.
    ///
    /// # Errors
    /// Returns `Error::Codec` if the payload exceeds [`Page::PAYLOAD_CAPACITY`].
    pub fn set_payload(&mut self, page_type: PageType, payload: &[u8]) -> Result<()> {
        if payload.len() > Self::PAYLOAD_CAPACITY {
            return Err(Error::codec(format!(
                "payload of {} bytes exceeds page capacity {}",
                payload.len(),
                Self::PAYLOAD_CAPACITY
            )));
        }

        self.reset();
        PageHeader::new(page_type, payload.len() as u32).encode_into(&mut self.data);
        self.data[PageHeader::SIZE..PageHeader::SIZE + payload.len()].copy_from_slice(payload);
        self.update_checksum();
        Ok(())
    }

    /// Compute and store checksum in the header.
    pub fn update_checksum(&mut self) {
        PageHeader::seal(&mut self.data);
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        PageHeader::is_intact(&self.data)
    }

    /// Verify the checksum, naming the page on failure.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` on a checksum mismatch.
    pub fn ensure_checksum(&self, page_id: PageId) -> Result<()> {
        if self.verify_checksum() {
            Ok(())
        } else {
            Err(Error::Corrupted {
                page: page_id.0,
                reason: "checksum mismatch".to_string(),
            })
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}

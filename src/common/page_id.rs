//! Page identifier type.

use std::fmt;

use crate::common::config::META_PAGE_ID;

/// Number of a page in the database file.
///
/// Page `n` starts at byte `n * PAGE_SIZE`. Page 0 holds the meta block.
///
/// # Example
/// ```
/// use pagetree::PageId;
///
/// assert!(PageId::META.is_meta());
/// assert_eq!(PageId::from_raw(u32::MAX), None);
/// assert_eq!(PageId::new(2).offset(4096), 8192);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// On-disk sentinel for "no page".
    pub const INVALID: PageId = PageId(u32::MAX);

    pub const META: PageId = PageId(META_PAGE_ID);

    #[inline]
    pub const fn new(id: u32) -> Self {
        PageId(id)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn is_meta(self) -> bool {
        self == Self::META
    }

    /// Byte offset of the page in a file of `page_size` pages.
    #[inline]
    pub const fn offset(self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }

    /// Raw form of an optional page id for on-disk pointers.
    #[inline]
    pub fn to_raw(page_id: Option<PageId>) -> u32 {
        page_id.map_or(Self::INVALID.0, |p| p.0)
    }

    /// Inverse of [`PageId::to_raw`].
    #[inline]
    pub fn from_raw(raw: u32) -> Option<PageId> {
        Some(PageId(raw)).filter(|p| p.is_valid())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Page({})", self.0)
        } else {
            f.write_str("Page(INVALID)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip_maps_sentinel_to_none() {
        assert_eq!(PageId::to_raw(None), u32::MAX);
        assert_eq!(PageId::to_raw(Some(PageId::new(9))), 9);
        assert_eq!(PageId::from_raw(9), Some(PageId::new(9)));
        assert_eq!(PageId::from_raw(u32::MAX), None);
    }

    #[test]
    fn test_offset_does_not_overflow_u32() {
        let last = PageId::new(u32::MAX - 1);
        assert_eq!(last.offset(4096), (u32::MAX as u64 - 1) * 4096);
    }

    #[test]
    fn test_display() {
        assert_eq!(PageId::META.to_string(), "Page(0)");
        assert_eq!(PageId::INVALID.to_string(), "Page(INVALID)");
    }
}

//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`]: what the page holds, a CRC32 over
//! the whole page, and how many payload bytes follow.

use crate::common::config::PAGE_SIZE;

/// What a page on disk holds.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Allocated but never written.
    #[default]
    Invalid = 0,
    /// File metadata (page 0).
    Meta = 1,
    /// A B-tree node record.
    Node = 2,
    /// A link in the free list.
    Free = 3,
}

impl PageType {
    /// Decode a type byte; unknown values read as `Invalid`.
    pub fn from_u8(value: u8) -> Self {
        [Self::Invalid, Self::Meta, Self::Node, Self::Free]
            .get(value as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Metadata at the start of every page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type
/// 1       4     checksum (CRC32, LE)
/// 5       4     payload_len (LE)
/// ```
///
/// The checksum covers all `PAGE_SIZE` bytes with its own field read as
/// zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
    pub payload_len: u32,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    const TYPE_AT: usize = 0;
    const CHECKSUM_AT: usize = 1;
    const LEN_AT: usize = 5;

    /// Header for a page about to be sealed; the checksum starts at zero.
    pub fn new(page_type: PageType, payload_len: u32) -> Self {
        Self {
            page_type,
            checksum: 0,
            payload_len,
        }
    }

    /// Parse the header of a page.
    pub fn decode(page: &[u8; PAGE_SIZE]) -> Self {
        Self {
            page_type: PageType::from_u8(page[Self::TYPE_AT]),
            checksum: read_u32(page, Self::CHECKSUM_AT),
            payload_len: read_u32(page, Self::LEN_AT),
        }
    }

    /// Write the header into the first [`Self::SIZE`] bytes of a page.
    pub fn encode_into(&self, page: &mut [u8; PAGE_SIZE]) {
        page[Self::TYPE_AT] = self.page_type as u8;
        write_u32(page, Self::CHECKSUM_AT, self.checksum);
        write_u32(page, Self::LEN_AT, self.payload_len);
    }

    /// CRC32 of a page, reading the checksum field as zero.
    pub fn checksum_of(page: &[u8; PAGE_SIZE]) -> u32 {
        let (before, rest) = page.split_at(Self::CHECKSUM_AT);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(before);
        hasher.update(&[0u8; 4]);
        hasher.update(&rest[4..]);
        hasher.finalize()
    }

    /// Store the page's checksum in its header field.
    pub fn seal(page: &mut [u8; PAGE_SIZE]) {
        let checksum = Self::checksum_of(page);
        write_u32(page, Self::CHECKSUM_AT, checksum);
    }

    /// Whether the stored checksum matches the page contents.
    pub fn is_intact(page: &[u8; PAGE_SIZE]) -> bool {
        read_u32(page, Self::CHECKSUM_AT) == Self::checksum_of(page)
    }
}

fn read_u32(page: &[u8; PAGE_SIZE], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&page[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn write_u32(page: &mut [u8; PAGE_SIZE], at: usize, value: u32) {
    page[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_is_invalid() {
        assert_eq!(PageType::from_u8(2), PageType::Node);
        assert_eq!(PageType::from_u8(4), PageType::Invalid);
        assert_eq!(PageType::from_u8(u8::MAX), PageType::Invalid);
    }

    #[test]
    fn test_header_layout() {
        let mut page = [0u8; PAGE_SIZE];
        let header = PageHeader {
            page_type: PageType::Free,
            checksum: 0xDDCC_BBAA,
            payload_len: 0x0102,
        };
        header.encode_into(&mut page);

        assert_eq!(&page[..PageHeader::SIZE], &[3, 0xAA, 0xBB, 0xCC, 0xDD, 0x02, 0x01, 0, 0]);
        assert_eq!(PageHeader::decode(&page), header);
    }

    #[test]
    fn test_seal_and_detect_damage() {
        let mut page = [0u8; PAGE_SIZE];
        PageHeader::new(PageType::Node, 3).encode_into(&mut page);
        page[PageHeader::SIZE..PageHeader::SIZE + 3].copy_from_slice(b"xyz");

        PageHeader::seal(&mut page);
        assert!(PageHeader::is_intact(&page));

        // Damage past the payload still counts
        page[PAGE_SIZE - 1] = 1;
        assert!(!PageHeader::is_intact(&page));
    }

    #[test]
    fn test_checksum_excludes_own_field() {
        let mut page = [7u8; PAGE_SIZE];
        let before = PageHeader::checksum_of(&page);
        page[PageHeader::CHECKSUM_AT..PageHeader::LEN_AT].fill(0);
        assert_eq!(PageHeader::checksum_of(&page), before);
    }
}

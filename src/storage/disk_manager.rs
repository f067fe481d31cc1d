//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating pages (reusing freed ones first)
//! - Maintaining the meta page (root pointer and free list)

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageType};

/// Magic bytes at the start of the meta payload.
pub const MAGIC: &[u8; 8] = b"PAGETREE";

/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 1;

/// Contents of the meta page payload.
///
/// # Layout (22 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     magic ("PAGETREE")
/// 8       2     format version
/// 10      4     root page id (u32::MAX = no root)
/// 14      4     free-list head (u32::MAX = empty)
/// 18      4     free page count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MetaBlock {
    root: Option<PageId>,
    free_head: Option<PageId>,
    free_count: u32,
}

impl MetaBlock {
    const SIZE: usize = 22;

    fn empty() -> Self {
        Self {
            root: None,
            free_head: None,
            free_count: 0,
        }
    }

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[10..14].copy_from_slice(&PageId::to_raw(self.root).to_le_bytes());
        buf[14..18].copy_from_slice(&PageId::to_raw(self.free_head).to_le_bytes());
        buf[18..22].copy_from_slice(&self.free_count.to_le_bytes());
        buf
    }

    fn from_bytes(data: &[u8]) -> Result<Self> {
        let corrupted = |reason: &str| Error::Corrupted {
            page: PageId::META.0,
            reason: reason.to_string(),
        };

        if data.len() < Self::SIZE {
            return Err(corrupted("meta payload truncated"));
        }
        if &data[0..8] != MAGIC {
            return Err(corrupted("bad magic"));
        }
        let version = u16::from_le_bytes([data[8], data[9]]);
        if version != FORMAT_VERSION {
            return Err(corrupted(&format!("unsupported format version {}", version)));
        }

        Ok(Self {
            root: PageId::from_raw(read_u32(data, 10)),
            free_head: PageId::from_raw(read_u32(data, 14)),
            free_count: read_u32(data, 18),
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (meta)  │ (node)  │ (free)  │         │ (node)  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Freed pages form a singly-linked list threaded through their payloads;
/// the head lives in the meta page. `allocate_page()` pops that list before
/// growing the file.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. `FileNodeStore` serializes access
/// to it behind a mutex.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file, including the meta page.
    page_count: u32,
    meta: MetaBlock,
}

impl DiskManager {
    /// Create a new database file with an empty meta page.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let mut dm = Self {
            file,
            page_count: 0,
            meta: MetaBlock::empty(),
        };
        dm.extend()?;
        dm.write_meta()?;

        debug!(path = %path.as_ref().display(), "created database file");
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// meta page is missing or corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;
        if page_count == 0 {
            return Err(Error::Corrupted {
                page: PageId::META.0,
                reason: "missing meta page".to_string(),
            });
        }

        let mut dm = Self {
            file,
            page_count,
            meta: MetaBlock::empty(),
        };

        let page = dm.read_page(PageId::META)?;
        page.ensure_checksum(PageId::META)?;
        if page.page_type() != PageType::Meta {
            return Err(Error::Corrupted {
                page: PageId::META.0,
                reason: format!("expected meta page, found {:?}", page.page_type()),
            });
        }
        dm.meta = MetaBlock::from_bytes(page.payload())?;

        debug!(
            path = %path.as_ref().display(),
            pages = page_count,
            root = ?dm.meta.root,
            "opened database file"
        );
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Allocate a page, reusing the head of the free list when possible.
    ///
    /// The returned page is zeroed (type `Invalid`) until first written.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let Some(page_id) = self.meta.free_head else {
            return self.extend();
        };

        let page = self.read_page(page_id)?;
        page.ensure_checksum(page_id)?;
        if page.page_type() != PageType::Free || page.payload().len() < 4 {
            return Err(Error::Corrupted {
                page: page_id.0,
                reason: "free-list entry is not a free page".to_string(),
            });
        }
        let next = PageId::from_raw(read_u32(page.payload(), 0));

        self.write_page(page_id, &Page::new())?;
        self.meta.free_head = next;
        self.meta.free_count = self.meta.free_count.saturating_sub(1);
        self.write_meta()?;

        trace!(%page_id, "reused free page");
        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` for the meta page or a page past the end
    /// of the file.
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        if page_id.is_meta() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let mut page = Page::new();
        page.set_payload(PageType::Free, &PageId::to_raw(self.meta.free_head).to_le_bytes())?;
        self.write_page(page_id, &page)?;

        self.meta.free_head = Some(page_id);
        self.meta.free_count += 1;
        self.write_meta()?;

        trace!(%page_id, free = self.meta.free_count, "freed page");
        Ok(())
    }

    /// The persisted root page, if any.
    #[inline]
    pub fn root(&self) -> Option<PageId> {
        self.meta.root
    }

    /// Persist a new root page (or clear it).
    pub fn set_root(&mut self, root: Option<PageId>) -> Result<()> {
        self.meta.root = root;
        self.write_meta()
    }

    /// Flush file contents to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the database, including the meta page.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of pages currently on the free list.
    #[inline]
    pub fn free_page_count(&self) -> u32 {
        self.meta.free_count
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count).offset(PAGE_SIZE)
    }

    /// Grow the file by one zeroed page.
    fn extend(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);

        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    fn write_meta(&mut self) -> Result<()> {
        let mut page = Page::new();
        page.set_payload(PageType::Meta, &self.meta.to_bytes())?;
        self.write_page(PageId::META, &page)
    }
}

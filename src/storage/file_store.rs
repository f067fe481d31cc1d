//! File-backed node store.

use std::path::Path;

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{Error, NodeId, PageId, Result};
use crate::storage::page::{Page, PageType};
use crate::storage::{DiskManager, NodeStore};

/// A [`NodeStore`] that keeps one node per page of a database file.
///
/// Node ids are page ids. Removed nodes go to the disk manager's free list
/// and their pages are handed out again by `allocate`. Pages that are free
/// or were allocated but never written read back as absent.
///
/// # Usage
/// ```no_run
/// use pagetree::storage::{FileNodeStore, NodeStore};
///
/// let store = FileNodeStore::open_or_create("index.db").unwrap();
/// let root = store.get_root().unwrap();
/// ```
pub struct FileNodeStore {
    disk_manager: Mutex<DiskManager>,
}

impl FileNodeStore {
    /// Wrap an already opened disk manager.
    pub fn new(disk_manager: DiskManager) -> Self {
        Self {
            disk_manager: Mutex::new(disk_manager),
        }
    }

    /// Create a new database file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DiskManager::create(path)?))
    }

    /// Open an existing database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DiskManager::open(path)?))
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DiskManager::open_or_create(path)?))
    }

    /// Pages in the file, including the meta page.
    pub fn page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Pages waiting on the free list.
    pub fn free_page_count(&self) -> u32 {
        self.disk_manager.lock().free_page_count()
    }
}

impl NodeStore for FileNodeStore {
    fn allocate(&self) -> Result<NodeId> {
        let page_id = self.disk_manager.lock().allocate_page()?;
        Ok(NodeId::from(page_id))
    }

    fn get(&self, id: NodeId) -> Result<Option<Vec<u8>>> {
        let page_id = PageId::from(id);
        if page_id.is_meta() {
            return Ok(None);
        }

        let page = match self.disk_manager.lock().read_page(page_id) {
            Ok(page) => page,
            Err(Error::PageNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match page.page_type() {
            PageType::Node => {
                page.ensure_checksum(page_id)?;
                Ok(Some(page.payload().to_vec()))
            }
            PageType::Free | PageType::Invalid => Ok(None),
            PageType::Meta => Err(Error::Corrupted {
                page: page_id.0,
                reason: "stray meta page".to_string(),
            }),
        }
    }

    fn put(&self, id: NodeId, bytes: &[u8]) -> Result<()> {
        if bytes.len() > Page::PAYLOAD_CAPACITY {
            return Err(Error::NodeTooLarge {
                id,
                size: bytes.len(),
                capacity: Page::PAYLOAD_CAPACITY,
            });
        }

        let page_id = PageId::from(id);
        if page_id.is_meta() {
            return Err(Error::invariant("node id collides with the meta page"));
        }

        let mut page = Page::new();
        page.set_payload(PageType::Node, bytes)?;
        self.disk_manager.lock().write_page(page_id, &page)?;

        trace!(%id, bytes = bytes.len(), "wrote node page");
        Ok(())
    }

    fn remove(&self, id: NodeId) -> Result<()> {
        let page_id = PageId::from(id);
        let mut dm = self.disk_manager.lock();

        if page_id.is_meta() || page_id.0 >= dm.page_count() {
            return Ok(());
        }
        if dm.read_page(page_id)?.page_type() == PageType::Free {
            return Ok(());
        }

        dm.free_page(page_id)
    }

    fn get_root(&self) -> Result<Option<NodeId>> {
        Ok(self.disk_manager.lock().root().map(NodeId::from))
    }

    fn put_root(&self, root: Option<NodeId>) -> Result<()> {
        self.disk_manager.lock().set_root(root.map(PageId::from))
    }

    fn sync(&self) -> Result<()> {
        self.disk_manager.lock().sync()
    }

    fn max_record_size(&self) -> Option<usize> {
        Some(Page::PAYLOAD_CAPACITY)
    }
}

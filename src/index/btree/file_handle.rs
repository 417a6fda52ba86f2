//! Open index file: page I/O, counters, root pointer and free list.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::{AttrType, Error, IndexConfig, PageId, Result};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::meta::{decode_free_page, encode_free_page, IndexMeta};
use crate::index::btree::node::{Family, LeafNode, Node};
use crate::index::btree::stats::{IoStats, IoStatsSnapshot};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Page holding the first root leaf of a new index.
const INITIAL_ROOT: PageId = PageId(1);

/// An open index file.
///
/// The handle exclusively owns its file. Every page read, write and append
/// goes through it and is counted.
///
/// # Thread Safety
/// Reads take `&self` so scans can share the handle; the disk manager sits
/// behind a mutex for that. Anything that changes the tree takes `&mut self`,
/// which keeps mutations and live scan cursors apart at compile time.
#[derive(Debug)]
pub struct IndexFileHandle {
    disk: Mutex<DiskManager>,
    path: PathBuf,
    /// Cached copy of page 0; written through on every change.
    meta: IndexMeta,
    stats: IoStats,
}

impl IndexFileHandle {
    /// Create a new index file holding an empty root leaf.
    ///
    /// # Errors
    /// Returns `Error::CreateFailed` if the file exists, or an append error.
    pub(crate) fn create(path: &Path, config: &IndexConfig) -> Result<()> {
        let mut disk =
            DiskManager::create(path, config.page_size)?.with_sync_writes(config.sync_writes);

        let meta = IndexMeta::new(config.page_size, INITIAL_ROOT);
        disk.append_page(&meta.encode())?;

        // An empty leaf encodes the same for every key type.
        let root = Node::Leaf(LeafNode::new(Family::ORPHAN));
        let root_page = NodeCodec::new(config.page_size, AttrType::Int).encode(&root)?;
        let root_id = disk.append_page(&root_page)?;
        debug_assert_eq!(root_id, INITIAL_ROOT);

        disk.sync()?;
        debug!("created index file {}", path.display());
        Ok(())
    }

    /// Open an existing index file and load its metadata page.
    ///
    /// # Errors
    /// - `Error::OpenFailed` if the file can't be opened
    /// - `Error::CorruptPage` / `Error::PageSizeMismatch` if page 0 is not a
    ///   valid metadata page for `config.page_size`
    pub(crate) fn open(path: &Path, config: &IndexConfig) -> Result<Self> {
        let mut disk =
            DiskManager::open(path, config.page_size)?.with_sync_writes(config.sync_writes);

        if disk.page_count() == 0 {
            return Err(Error::corrupt(PageId::META, "file has no metadata page"));
        }
        let stats = IoStats::new();
        let meta_page = disk.read_page(PageId::META)?;
        stats.record_read();
        let meta = IndexMeta::decode(&meta_page).inspect_err(|e| warn!("{}: {}", path.display(), e))?;

        if !meta.root.is_valid() || meta.root.0 >= disk.page_count() || meta.root == PageId::META
        {
            return Err(Error::corrupt(
                PageId::META,
                format!("root {} outside file of {} pages", meta.root, disk.page_count()),
            ));
        }

        debug!(
            "opened index file {} (root {}, {} pages)",
            path.display(),
            meta.root,
            disk.page_count()
        );
        Ok(Self {
            disk: Mutex::new(disk),
            path: path.to_path_buf(),
            meta,
            stats,
        })
    }

    /// Flush and release the file.
    pub(crate) fn close(self) -> Result<()> {
        let mut disk = self.disk.into_inner();
        disk.sync()?;
        debug!("closed index file {}", self.path.display());
        Ok(())
    }

    // ========================================================================
    // Public accessors
    // ========================================================================

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file, including the metadata page and free
    /// pages.
    pub fn page_count(&self) -> u32 {
        self.disk.lock().page_count()
    }

    /// Size of every page in the file.
    pub fn page_size(&self) -> usize {
        self.meta.page_size
    }

    /// Page number of the current root node.
    ///
    /// Changes when the root splits or collapses, so callers re-read it at
    /// the start of every traversal.
    pub fn root_page_id(&self) -> PageId {
        self.meta.root
    }

    /// Live I/O counters.
    pub fn stats(&self) -> &IoStats {
        &self.stats
    }

    /// Current read / write / append counters.
    pub fn collect_counter_values(&self) -> IoStatsSnapshot {
        self.stats.snapshot()
    }

    /// Pages currently on the free list, head first.
    ///
    /// # Errors
    /// Returns `Error::CorruptPage` if the list runs into a non-free page or
    /// loops.
    pub fn free_pages(&self) -> Result<Vec<PageId>> {
        let limit = self.page_count() as usize;
        let mut pages = Vec::new();
        let mut next = self.meta.free_list_head;
        while let Some(page_id) = next.valid() {
            if pages.len() >= limit {
                return Err(Error::corrupt(page_id, "free list contains a cycle"));
            }
            let page = self.read_page(page_id)?;
            pages.push(page_id);
            next = decode_free_page(&page).map_err(|e| e.at_page(page_id))?;
        }
        Ok(pages)
    }

    // ========================================================================
    // Raw page I/O
    // ========================================================================

    pub(crate) fn read_page(&self, page_id: PageId) -> Result<Page> {
        let page = self.disk.lock().read_page(page_id)?;
        self.stats.record_read();
        Ok(page)
    }

    pub(crate) fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.disk.get_mut().write_page(page_id, page)?;
        self.stats.record_write();
        Ok(())
    }

    pub(crate) fn append_page(&mut self, page: &Page) -> Result<PageId> {
        let page_id = self.disk.get_mut().append_page(page)?;
        self.stats.record_append();
        Ok(page_id)
    }

    // ========================================================================
    // Node I/O
    // ========================================================================

    /// Read and decode a node page.
    ///
    /// # Errors
    /// Returns `Error::CorruptPage` carrying `page_id` if decoding fails.
    pub(crate) fn read_node(&self, page_id: PageId, codec: &NodeCodec) -> Result<Node> {
        if page_id == PageId::META {
            return Err(Error::corrupt(page_id, "node link points at the metadata page"));
        }
        let page = self.read_page(page_id)?;
        codec.decode(&page).map_err(|e| {
            let e = e.at_page(page_id);
            warn!("{}: {}", self.path.display(), e);
            e
        })
    }

    /// Encode and write a node page.
    ///
    /// # Errors
    /// Returns `Error::PageOverflow` if the node doesn't fit. The mutation
    /// engine only writes nodes it has already sized.
    pub(crate) fn write_node(&mut self, page_id: PageId, node: &Node, codec: &NodeCodec) -> Result<()> {
        let page = codec.encode(node)?;
        self.write_page(page_id, &page)
    }

    // ========================================================================
    // Tree-level state
    // ========================================================================

    /// Point the metadata page at a new root.
    pub(crate) fn set_root(&mut self, root: PageId) -> Result<()> {
        debug!("root moves from {} to {}", self.meta.root, root);
        self.meta.root = root;
        self.write_meta()
    }

    /// Get a page for a new node, reusing a freed page when one exists.
    ///
    /// The returned page's contents are undefined until the caller writes a
    /// node into it.
    pub(crate) fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(page_id) = self.meta.free_list_head.valid() {
            let page = self.read_page(page_id)?;
            let next = decode_free_page(&page).map_err(|e| e.at_page(page_id))?;
            self.meta.free_list_head = next;
            self.write_meta()?;
            debug!("reusing free {}", page_id);
            return Ok(page_id);
        }
        self.append_page(&Page::new(self.meta.page_size))
    }

    /// Put a page that no node references any more on the free list.
    pub(crate) fn release_page(&mut self, page_id: PageId) -> Result<()> {
        let page = encode_free_page(self.meta.page_size, self.meta.free_list_head);
        self.write_page(page_id, &page)?;
        self.meta.free_list_head = page_id;
        self.write_meta()?;
        debug!("released {}", page_id);
        Ok(())
    }

    fn write_meta(&mut self) -> Result<()> {
        let page = self.meta.encode();
        self.write_page(PageId::META, &page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::node::NodeOps;
    use tempfile::tempdir;

    fn config() -> IndexConfig {
        IndexConfig::default().with_page_size(256).with_sync_writes(false)
    }

    #[test]
    fn test_create_and_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        IndexFileHandle::create(&path, &config()).unwrap();

        let handle = IndexFileHandle::open(&path, &config()).unwrap();
        assert_eq!(handle.page_count(), 2);
        assert_eq!(handle.page_size(), 256);
        assert_eq!(handle.root_page_id(), PageId::new(1));
        assert_eq!(handle.collect_counter_values().pages_read, 1);

        let codec = NodeCodec::new(256, AttrType::Int);
        let root = handle.read_node(handle.root_page_id(), &codec).unwrap();
        assert!(root.is_root());
        assert_eq!(root.entry_count(), 0);
    }

    #[test]
    fn test_open_with_other_page_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        IndexFileHandle::create(&path, &config()).unwrap();

        // 512 bytes is a whole number of 512-byte pages, so the mismatch is
        // only caught by the metadata page.
        let other = config().with_page_size(512);
        assert!(matches!(
            IndexFileHandle::open(&path, &other),
            Err(Error::PageSizeMismatch {
                expected: 512,
                found: 256
            })
        ));
    }

    #[test]
    fn test_open_non_index_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.idx");
        std::fs::write(&path, [0u8; 512]).unwrap();

        assert!(matches!(
            IndexFileHandle::open(&path, &config()),
            Err(Error::CorruptPage { .. })
        ));
    }

    #[test]
    fn test_free_list_reuse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        IndexFileHandle::create(&path, &config()).unwrap();
        let mut handle = IndexFileHandle::open(&path, &config()).unwrap();

        let a = handle.allocate_page().unwrap();
        let b = handle.allocate_page().unwrap();
        assert_eq!((a, b), (PageId::new(2), PageId::new(3)));
        assert_eq!(handle.collect_counter_values().pages_appended, 2);

        handle.release_page(a).unwrap();
        handle.release_page(b).unwrap();
        assert_eq!(handle.free_pages().unwrap(), vec![b, a]);

        assert_eq!(handle.allocate_page().unwrap(), b);
        assert_eq!(handle.allocate_page().unwrap(), a);
        assert!(handle.free_pages().unwrap().is_empty());
        assert_eq!(handle.page_count(), 4);
    }

    #[test]
    fn test_root_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        IndexFileHandle::create(&path, &config()).unwrap();

        {
            let mut handle = IndexFileHandle::open(&path, &config()).unwrap();
            let page_id = handle.allocate_page().unwrap();
            let codec = NodeCodec::new(256, AttrType::Int);
            handle
                .write_node(page_id, &Node::Leaf(LeafNode::new(Family::ORPHAN)), &codec)
                .unwrap();
            handle.set_root(page_id).unwrap();
            handle.close().unwrap();
        }

        let handle = IndexFileHandle::open(&path, &config()).unwrap();
        assert_eq!(handle.root_page_id(), PageId::new(2));
    }

    #[test]
    fn test_read_node_rejects_meta_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.idx");
        IndexFileHandle::create(&path, &config()).unwrap();
        let handle = IndexFileHandle::open(&path, &config()).unwrap();

        let codec = NodeCodec::new(256, AttrType::Int);
        assert!(matches!(
            handle.read_node(PageId::META, &codec),
            Err(Error::CorruptPage { .. })
        ));
    }
}

//! Disk Manager - the paged file store under an index.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Creating, opening and destroying files
//! - Reading, writing and appending pages
//! - Reporting the page count

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single paged file.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0        P        2P     ...      N×P
/// ```
///
/// Page N is located at file offset `N × page_size`. Pages are only ever
/// added at the end, so page numbers stay contiguous.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The index file handle wraps it in a
/// mutex.
///
/// # Durability
/// With `sync_writes` enabled (the default) every write and append is
/// followed by `fsync()`.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    path: PathBuf,
    page_size: usize,
    /// Number of pages in the file.
    page_count: u32,
    sync_writes: bool,
}

impl DiskManager {
    /// Create a new, empty paged file.
    ///
    /// # Errors
    /// Returns `Error::CreateFailed` if the file already exists or cannot be
    /// created.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| Error::CreateFailed {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("created paged file {} (page size {})", path.display(), page_size);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
            page_count: 0,
            sync_writes: true,
        })
    }

    /// Open an existing paged file.
    ///
    /// # Errors
    /// Returns `Error::OpenFailed` if the file doesn't exist, cannot be
    /// opened, or its length is not a whole number of pages.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let open_failed = |source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_failed)?;
        let file_size = file.metadata().map_err(open_failed)?.len();

        if file_size % page_size as u64 != 0 {
            return Err(open_failed(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file size {file_size} is not a multiple of page size {page_size}"),
            )));
        }
        let page_count = (file_size / page_size as u64) as u32;

        debug!("opened paged file {} ({} pages)", path.display(), page_count);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_size,
            page_count,
            sync_writes: true,
        })
    }

    /// Remove a paged file from disk.
    ///
    /// # Errors
    /// Returns `Error::DestroyFailed` if the file can't be removed.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|source| Error::DestroyFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("destroyed paged file {}", path.display());
        Ok(())
    }

    /// Enable or disable `fsync()` after each write.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist, or
    /// `Error::ReadFailed` on I/O failure.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        let mut page = Page::new(self.page_size);
        let offset = self.offset_of(page_id);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(page.as_mut_slice()))
            .map_err(|source| Error::ReadFailed { page_id, source })?;

        trace!("read {}", page_id);
        Ok(page)
    }

    /// Overwrite an existing page.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been appended yet, or
    /// `Error::WriteFailed` on I/O failure.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }
        debug_assert_eq!(page.size(), self.page_size);

        let offset = self.offset_of(page_id);
        let sync = self.sync_writes;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(page.as_slice()))
            .and_then(|_| if sync { self.file.sync_all() } else { Ok(()) })
            .map_err(|source| Error::WriteFailed { page_id, source })?;

        trace!("wrote {}", page_id);
        Ok(())
    }

    /// Append a page at the end of the file.
    ///
    /// Returns the `PageId` of the new page.
    ///
    /// # Errors
    /// Returns `Error::AppendFailed` on I/O failure.
    pub fn append_page(&mut self, page: &Page) -> Result<PageId> {
        debug_assert_eq!(page.size(), self.page_size);
        let page_id = PageId::new(self.page_count);

        let offset = self.offset_of(page_id);
        let sync = self.sync_writes;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(page.as_slice()))
            .and_then(|_| if sync { self.file.sync_all() } else { Ok(()) })
            .map_err(|source| Error::AppendFailed { source })?;

        self.page_count += 1;
        trace!("appended {}", page_id);
        Ok(page_id)
    }

    /// Flush file contents and metadata to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(|source| Error::WriteFailed {
            page_id: PageId::INVALID,
            source,
        })
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the page size this file was opened with.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (self.page_size as u64)
    }

    #[inline]
    fn offset_of(&self, page_id: PageId) -> u64 {
        page_id.byte_offset(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 256;

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let dm = DiskManager::create(&path, PAGE_SIZE).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), 0);
        assert_eq!(dm.page_size(), PAGE_SIZE);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        DiskManager::create(&path, PAGE_SIZE).unwrap();
        assert!(matches!(
            DiskManager::create(&path, PAGE_SIZE),
            Err(Error::CreateFailed { .. })
        ));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.idx");

        assert!(matches!(
            DiskManager::open(&path, PAGE_SIZE),
            Err(Error::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_open_torn_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.idx");
        fs::write(&path, [0u8; PAGE_SIZE + 3]).unwrap();

        assert!(matches!(
            DiskManager::open(&path, PAGE_SIZE),
            Err(Error::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_append_and_read_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut dm = DiskManager::create(&path, PAGE_SIZE)
            .unwrap()
            .with_sync_writes(false);

        let mut page = Page::new(PAGE_SIZE);
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[PAGE_SIZE - 1] = 0xEF;

        let page_id = dm.append_page(&page).unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(dm.page_count(), 1);

        let read = dm.read_page(page_id).unwrap();
        assert_eq!(read, page);
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut dm = DiskManager::create(&path, PAGE_SIZE).unwrap();
        let page_id = dm.append_page(&Page::new(PAGE_SIZE)).unwrap();

        let mut page = Page::new(PAGE_SIZE);
        page.as_mut_slice()[100] = 0xCD;
        dm.write_page(page_id, &page).unwrap();

        assert_eq!(dm.read_page(page_id).unwrap().as_slice()[100], 0xCD);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut dm = DiskManager::create(&path, PAGE_SIZE).unwrap();
            let mut page = Page::new(PAGE_SIZE);
            page.as_mut_slice()[0] = 0x42;
            dm.append_page(&page).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path, PAGE_SIZE).unwrap();
            assert_eq!(dm.page_count(), 1);
            assert_eq!(dm.read_page(PageId::new(0)).unwrap().as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_contiguous_page_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut dm = DiskManager::create(&path, PAGE_SIZE)
            .unwrap()
            .with_sync_writes(false);

        for i in 0..10u32 {
            let mut page = Page::new(PAGE_SIZE);
            page.as_mut_slice()[0] = i as u8;
            assert_eq!(dm.append_page(&page).unwrap(), PageId::new(i));
        }

        assert_eq!(dm.page_count(), 10);
        assert_eq!(dm.file_size(), 10 * PAGE_SIZE as u64);
        for i in 0..10u32 {
            assert_eq!(dm.read_page(PageId::new(i)).unwrap().as_slice()[0], i as u8);
        }
    }

    #[test]
    fn test_read_and_write_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut dm = DiskManager::create(&path, PAGE_SIZE).unwrap();
        dm.append_page(&Page::new(PAGE_SIZE)).unwrap();

        assert!(matches!(
            dm.read_page(PageId::new(1)),
            Err(Error::PageNotFound(_))
        ));
        assert!(matches!(
            dm.read_page(PageId::INVALID),
            Err(Error::PageNotFound(_))
        ));
        assert!(matches!(
            dm.write_page(PageId::new(5), &Page::new(PAGE_SIZE)),
            Err(Error::PageNotFound(_))
        ));
    }

    #[test]
    fn test_destroy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        DiskManager::create(&path, PAGE_SIZE).unwrap();

        DiskManager::destroy(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(
            DiskManager::destroy(&path),
            Err(Error::DestroyFailed { .. })
        ));
    }
}

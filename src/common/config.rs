//! Configuration constants and per-manager settings.

use crate::common::{Error, Result};

/// Default size of an index page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every page of one index file
/// has the same size; the size is recorded in the metadata page so a file
/// can't be reopened with a different one.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size an index file may use.
///
/// Below this a page can't hold enough entries for splits to produce two
/// valid halves.
pub const MIN_PAGE_SIZE: usize = 128;

/// Largest page size an index file may use.
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

/// Settings shared by every file an [`IndexManager`](crate::IndexManager)
/// creates or opens.
///
/// # Example
/// ```
/// use bptree_index::IndexConfig;
///
/// let config = IndexConfig::default().with_page_size(512).with_sync_writes(false);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.page_size, 512);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Size of every page in bytes.
    pub page_size: usize,
    /// Call `fsync()` after every page write and append.
    pub sync_writes: bool,
}

impl IndexConfig {
    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable or disable `fsync()` after writes.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Check that the settings describe a usable index file.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the page size is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidConfig(format!(
                "page size {} outside [{}, {}]",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sync_writes: true,
        }
    }
}

//! Operational surface of the index engine.

use std::path::Path;

use crate::common::{Attribute, Error, IndexConfig, Result, Rid};
use crate::index::btree::{
    check_tree, dump_tree, max_key_len, IndexFileHandle, NodeCodec, ScanBounds, ScanCursor,
    TreeMutator, TreeShape,
};
use crate::index::key::{IndexEntry, Key};
use crate::storage::DiskManager;

/// Creates, opens and modifies index files.
///
/// Every index file created or opened through one manager uses the manager's
/// [`IndexConfig`]. Managers hold no per-file state, so any number of them can
/// coexist.
///
/// # Example
/// ```no_run
/// use bptree_index::{Attribute, IndexConfig, IndexManager, Key, Rid};
///
/// let manager = IndexManager::new(IndexConfig::default())?;
/// manager.create_file("age.idx")?;
/// let mut handle = manager.open_file("age.idx")?;
///
/// let age = Attribute::int("age");
/// manager.insert_entry(&mut handle, &age, &Key::Int(42), Rid::new(1, 0))?;
///
/// let low = Key::Int(40);
/// for entry in manager.scan(&handle, &age, Some(&low), None, true, true)? {
///     println!("{}", entry?);
/// }
/// manager.close_file(handle)?;
/// # Ok::<(), bptree_index::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    config: IndexConfig,
}

impl IndexManager {
    /// Create a manager.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the page size is out of range.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    // ========================================================================
    // File lifecycle
    // ========================================================================

    /// Create an index file holding an empty tree.
    ///
    /// # Errors
    /// Returns `Error::CreateFailed` if the file already exists.
    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        IndexFileHandle::create(path.as_ref(), &self.config)
    }

    /// Delete an index file.
    pub fn destroy_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        DiskManager::destroy(path)
    }

    /// Open an index file.
    ///
    /// # Errors
    /// - `Error::OpenFailed` if the file is missing or not a whole number of
    ///   pages
    /// - `Error::CorruptPage` if page 0 is not an index metadata page
    /// - `Error::PageSizeMismatch` if the file uses another page size
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<IndexFileHandle> {
        IndexFileHandle::open(path.as_ref(), &self.config)
    }

    /// Flush and close an index file.
    pub fn close_file(&self, handle: IndexFileHandle) -> Result<()> {
        handle.close()
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Insert `(key, rid)`.
    ///
    /// The same key may be inserted under any number of RIDs.
    ///
    /// # Errors
    /// - `Error::KeyTypeMismatch` if `key` doesn't match `attr`
    /// - `Error::KeyTooLarge` if `key` exceeds the attribute's declared length
    ///   or the largest key a page can hold
    /// - `Error::DuplicateEntry` if exactly this `(key, rid)` is indexed
    pub fn insert_entry(
        &self,
        handle: &mut IndexFileHandle,
        attr: &Attribute,
        key: &Key,
        rid: Rid,
    ) -> Result<()> {
        let codec = Self::codec(handle, attr);
        key.validate(attr, max_key_len(&codec))?;
        TreeMutator::new(handle, codec).insert(IndexEntry::new(key.clone(), rid))
    }

    /// Remove exactly `(key, rid)`.
    ///
    /// # Errors
    /// - `Error::KeyTypeMismatch` if `key` doesn't match `attr`
    /// - `Error::EntryNotFound` if the pair isn't indexed; the tree is left
    ///   unchanged
    pub fn delete_entry(
        &self,
        handle: &mut IndexFileHandle,
        attr: &Attribute,
        key: &Key,
        rid: Rid,
    ) -> Result<()> {
        check_type(attr, key)?;
        let codec = Self::codec(handle, attr);
        TreeMutator::new(handle, codec).delete(&IndexEntry::new(key.clone(), rid))
    }

    /// Open a cursor over the entries whose key lies between `low` and
    /// `high`. A `None` bound is unbounded on that side.
    ///
    /// The cursor borrows `handle`; the index can't be modified until it is
    /// dropped.
    pub fn scan<'a>(
        &self,
        handle: &'a IndexFileHandle,
        attr: &Attribute,
        low: Option<&Key>,
        high: Option<&Key>,
        low_inclusive: bool,
        high_inclusive: bool,
    ) -> Result<ScanCursor<'a>> {
        for bound in low.iter().chain(high.iter()) {
            check_type(attr, bound)?;
        }
        let bounds = ScanBounds {
            low: low.cloned(),
            high: high.cloned(),
            low_inclusive,
            high_inclusive,
        };
        let mut cursor = ScanCursor::new(handle, Self::codec(handle, attr), bounds);
        cursor.open()?;
        Ok(cursor)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Render the tree in pre-order as nested JSON-like records.
    pub fn print_btree(&self, handle: &IndexFileHandle, attr: &Attribute) -> Result<String> {
        dump_tree(handle, &Self::codec(handle, attr))
    }

    /// Walk the whole tree and verify its structural invariants.
    ///
    /// # Errors
    /// Returns `Error::CorruptPage` naming the first offending page.
    pub fn check_btree(&self, handle: &IndexFileHandle, attr: &Attribute) -> Result<TreeShape> {
        check_tree(handle, &Self::codec(handle, attr))
    }

    fn codec(handle: &IndexFileHandle, attr: &Attribute) -> NodeCodec {
        NodeCodec::new(handle.page_size(), attr.attr_type)
    }
}

fn check_type(attr: &Attribute, key: &Key) -> Result<()> {
    if key.attr_type() != attr.attr_type {
        return Err(Error::KeyTypeMismatch {
            expected: attr.attr_type,
            found: key.attr_type(),
        });
    }
    Ok(())
}

//! Bounded range scans over the leaf chain.

use log::trace;

use crate::common::{Error, PageId, Result, Rid};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::file_handle::IndexFileHandle;
use crate::index::btree::navigator::Navigator;
use crate::index::btree::node::{LeafNode, Node};
use crate::index::key::{IndexEntry, Key};

/// Where a cursor stands.
#[derive(Debug)]
enum ScanState {
    Unopened,
    /// `index` may point past the end of `leaf`; the next call crosses to the
    /// right sibling before reading.
    Positioned {
        page_id: PageId,
        leaf: LeafNode,
        index: usize,
    },
    Exhausted,
    Closed,
}

/// Inclusive or exclusive key bounds of a scan. `None` is unbounded.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScanBounds {
    pub low: Option<Key>,
    pub high: Option<Key>,
    pub low_inclusive: bool,
    pub high_inclusive: bool,
}

/// A cursor yielding the entries whose key lies within the scan bounds, in
/// `(key, rid)` order.
///
/// The cursor borrows the file handle, so the tree can't be modified while
/// the cursor is alive. It reads one leaf page at a time and follows the
/// right-sibling chain.
///
/// End of scan is `Ok(None)` from [`next_entry`](Self::next_entry), or `None`
/// from the iterator.
#[derive(Debug)]
pub struct ScanCursor<'a> {
    file: &'a IndexFileHandle,
    codec: NodeCodec,
    bounds: ScanBounds,
    state: ScanState,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(file: &'a IndexFileHandle, codec: NodeCodec, bounds: ScanBounds) -> Self {
        Self {
            file,
            codec,
            bounds,
            state: ScanState::Unopened,
        }
    }

    /// Position on the first qualifying entry, or go straight to the end of
    /// the scan if there is none.
    pub(crate) fn open(&mut self) -> Result<()> {
        let navigator = Navigator::new(self.file, &self.codec);
        let (page_id, leaf, index) = match &self.bounds.low {
            None => {
                let (page_id, leaf) = navigator.leftmost_leaf()?;
                (page_id, leaf, 0)
            }
            Some(low) => {
                let probe = IndexEntry::new(low.clone(), Rid::MIN);
                let (page_id, leaf) = navigator.find_leaf_for(&probe)?;
                let index = leaf.lower_bound(&probe);
                (page_id, leaf, index)
            }
        };
        trace!("scan opens at {} index {}", page_id, index);
        self.state = ScanState::Positioned {
            page_id,
            leaf,
            index,
        };
        self.skip_to_entry()?;

        if !self.bounds.low_inclusive {
            if let Some(low) = self.bounds.low.clone() {
                while self.current().is_some_and(|e| e.key == low) {
                    self.step();
                    self.skip_to_entry()?;
                }
            }
        }

        if !self.current().is_some_and(|e| self.within_high(&e.key)) {
            self.state = ScanState::Exhausted;
        }
        Ok(())
    }

    /// Return the next qualifying entry and advance.
    ///
    /// # Errors
    /// - `Error::ScanClosed` after [`close`](Self::close)
    /// - page read or decode errors while following the leaf chain
    pub fn next_entry(&mut self) -> Result<Option<IndexEntry>> {
        match self.state {
            ScanState::Closed => return Err(Error::ScanClosed),
            ScanState::Unopened => self.open()?,
            _ => {}
        }

        self.skip_to_entry()?;
        let entry = match self.current() {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        if !self.within_high(&entry.key) {
            self.state = ScanState::Exhausted;
            return Ok(None);
        }
        self.step();
        Ok(Some(entry))
    }

    /// End the scan. Any later [`next_entry`](Self::next_entry) fails.
    pub fn close(&mut self) {
        self.state = ScanState::Closed;
    }

    /// Whether the scan has run past its last qualifying entry.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, ScanState::Exhausted)
    }

    /// Leaf page the cursor stands on, if it is positioned.
    pub fn current_page(&self) -> Option<PageId> {
        match &self.state {
            ScanState::Positioned { page_id, .. } => Some(*page_id),
            _ => None,
        }
    }

    fn current(&self) -> Option<&IndexEntry> {
        match &self.state {
            ScanState::Positioned { leaf, index, .. } => leaf.entries.get(*index),
            _ => None,
        }
    }

    fn step(&mut self) {
        if let ScanState::Positioned { index, .. } = &mut self.state {
            *index += 1;
        }
    }

    fn within_high(&self, key: &Key) -> bool {
        match &self.bounds.high {
            None => true,
            Some(high) if self.bounds.high_inclusive => key <= high,
            Some(high) => key < high,
        }
    }

    /// Cross right siblings until the position holds an entry, or mark the
    /// scan exhausted at the end of the chain. Empty leaves are skipped.
    fn skip_to_entry(&mut self) -> Result<()> {
        loop {
            let next = match &self.state {
                ScanState::Positioned { leaf, index, .. } if *index < leaf.entries.len() => {
                    return Ok(())
                }
                ScanState::Positioned { leaf, .. } => leaf.family.right_sibling,
                _ => return Ok(()),
            };
            let Some(page_id) = next.valid() else {
                self.state = ScanState::Exhausted;
                return Ok(());
            };
            let leaf = match self.file.read_node(page_id, &self.codec)? {
                Node::Leaf(leaf) => leaf,
                Node::Interior(_) => {
                    return Err(Error::corrupt(page_id, "leaf chain reaches an interior node"))
                }
            };
            trace!("scan crosses to {}", page_id);
            self.state = ScanState::Positioned {
                page_id,
                leaf,
                index: 0,
            };
        }
    }
}

impl Iterator for ScanCursor<'_> {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AttrType, IndexConfig};
    use crate::index::btree::mutation::TreeMutator;
    use tempfile::{tempdir, TempDir};

    const PAGE_SIZE: usize = 128;

    /// Keys 0..n, each under two RIDs, on small pages so the chain spans
    /// many leaves.
    fn build(n: i32) -> (TempDir, IndexFileHandle, NodeCodec) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.idx");
        let config = IndexConfig::default()
            .with_page_size(PAGE_SIZE)
            .with_sync_writes(false);
        IndexFileHandle::create(&path, &config).unwrap();
        let mut file = IndexFileHandle::open(&path, &config).unwrap();
        let codec = NodeCodec::new(PAGE_SIZE, AttrType::Int);
        {
            let mut mutator = TreeMutator::new(&mut file, codec);
            for k in 0..n {
                for slot in [1, 0] {
                    mutator
                        .insert(IndexEntry::new(Key::Int(k), Rid::new(k as u32, slot)))
                        .unwrap();
                }
            }
        }
        (dir, file, codec)
    }

    fn keys(cursor: ScanCursor<'_>) -> Vec<i32> {
        cursor
            .map(|e| match e.unwrap().key {
                Key::Int(k) => k,
                other => panic!("unexpected key {other}"),
            })
            .collect()
    }

    fn bounds(low: Option<i32>, high: Option<i32>, li: bool, hi: bool) -> ScanBounds {
        ScanBounds {
            low: low.map(Key::Int),
            high: high.map(Key::Int),
            low_inclusive: li,
            high_inclusive: hi,
        }
    }

    #[test]
    fn test_full_scan_in_order() {
        let (_dir, file, codec) = build(40);
        let entries: Vec<IndexEntry> = ScanCursor::new(&file, codec, ScanBounds::default())
            .map(Result::unwrap)
            .collect();

        assert_eq!(entries.len(), 80);
        assert!(entries.windows(2).all(|w| w[0] < w[1]));
        // Duplicates come back in RID order.
        assert_eq!(entries[0].rid, Rid::new(0, 0));
        assert_eq!(entries[1].rid, Rid::new(0, 1));
    }

    #[test]
    fn test_bounds_inclusive_and_exclusive() {
        let (_dir, file, codec) = build(40);
        let scan = |b| keys(ScanCursor::new(&file, codec, b));

        assert_eq!(scan(bounds(Some(10), Some(12), true, true)), [10, 10, 11, 11, 12, 12]);
        assert_eq!(scan(bounds(Some(10), Some(12), false, true)), [11, 11, 12, 12]);
        assert_eq!(scan(bounds(Some(10), Some(12), true, false)), [10, 10, 11, 11]);
        assert_eq!(scan(bounds(Some(10), Some(12), false, false)), [11, 11]);
        assert_eq!(scan(bounds(None, Some(1), true, true)), [0, 0, 1, 1]);
        assert_eq!(scan(bounds(Some(38), None, false, true)), [39, 39]);
    }

    #[test]
    fn test_empty_ranges_exhaust_on_open() {
        let (_dir, file, codec) = build(20);

        let mut cursor = ScanCursor::new(&file, codec, bounds(Some(5), Some(5), false, true));
        cursor.open().unwrap();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_entry().unwrap(), None);

        let mut cursor = ScanCursor::new(&file, codec, bounds(Some(100), None, true, true));
        cursor.open().unwrap();
        assert!(cursor.is_exhausted());

        let mut cursor = ScanCursor::new(&file, codec, bounds(Some(9), Some(3), true, true));
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_scan_of_empty_tree() {
        let (_dir, file, codec) = build(0);
        let mut cursor = ScanCursor::new(&file, codec, ScanBounds::default());
        assert_eq!(cursor.next_entry().unwrap(), None);
        assert_eq!(cursor.next_entry().unwrap(), None);
    }

    #[test]
    fn test_closed_cursor_errors() {
        let (_dir, file, codec) = build(5);
        let mut cursor = ScanCursor::new(&file, codec, ScanBounds::default());
        assert!(cursor.next_entry().unwrap().is_some());

        cursor.close();
        assert!(matches!(cursor.next_entry(), Err(Error::ScanClosed)));
        assert!(matches!(cursor.next(), Some(Err(Error::ScanClosed))));
    }
}

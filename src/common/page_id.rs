//! Page numbers within an index file.

use std::fmt;

/// Zero-based page number.
///
/// Page 0 is always the metadata page. Node pages, free pages and the
/// family links stored inside nodes all use this type; a missing link is
/// [`PageId::INVALID`].
///
/// ```
/// use bptree_index::PageId;
///
/// let leaf = PageId::new(3);
/// assert_eq!(leaf.valid(), Some(leaf));
/// assert_eq!(PageId::INVALID.valid(), None);
/// assert_eq!(leaf.byte_offset(4096), 12_288);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Missing link. On disk this is `0xFFFF_FFFF`, i.e. `-1` read as `i32`.
    pub const INVALID: PageId = PageId(u32::MAX);

    pub const META: PageId = PageId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Turn a stored link into an `Option`.
    #[inline]
    pub fn valid(self) -> Option<PageId> {
        self.is_valid().then_some(self)
    }

    /// Position of this page in a file of `page_size`-byte pages.
    #[inline]
    pub fn byte_offset(self, page_size: usize) -> u64 {
        u64::from(self.0) * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.valid() {
            Some(PageId(n)) => write!(f, "page {}", n),
            None => f.write_str("page <none>"),
        }
    }
}

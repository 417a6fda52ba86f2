//! Metadata page and free-list page formats.
//!
//! Page 0 of every index file is the metadata page:
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = Meta, checksum)
//! 5       8     magic "BPTIDX\0\x01"
//! 13      4     format version
//! 17      4     page size
//! 21      4     root page number
//! 25      4     head of the free-page list (0xFFFF_FFFF when empty)
//! ```
//!
//! Pages released by merges are chained through their first field:
//! ```text
//! 0       5     PageHeader (type = Free, checksum)
//! 5       4     next free page
//! ```

use crate::common::{Error, PageId, Result};
use crate::index::btree::codec::{read_u32, write_u32};
use crate::storage::page::{Page, PageHeader, PageType};

/// Identifies an index file.
pub const MAGIC: [u8; 8] = *b"BPTIDX\0\x01";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

const OFFSET_MAGIC: usize = PageHeader::SIZE;
const OFFSET_VERSION: usize = OFFSET_MAGIC + 8;
const OFFSET_PAGE_SIZE: usize = OFFSET_VERSION + 4;
const OFFSET_ROOT: usize = OFFSET_PAGE_SIZE + 4;
const OFFSET_FREE_HEAD: usize = OFFSET_ROOT + 4;

const OFFSET_NEXT_FREE: usize = PageHeader::SIZE;

/// Tree-level state persisted in page 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMeta {
    pub page_size: usize,
    pub root: PageId,
    pub free_list_head: PageId,
}

impl IndexMeta {
    pub fn new(page_size: usize, root: PageId) -> Self {
        Self {
            page_size,
            root,
            free_list_head: PageId::INVALID,
        }
    }

    pub fn encode(&self) -> Page {
        let mut page = Page::formatted(self.page_size, PageType::Meta);
        let data = page.as_mut_slice();
        data[OFFSET_MAGIC..OFFSET_MAGIC + 8].copy_from_slice(&MAGIC);
        write_u32(data, OFFSET_VERSION, FORMAT_VERSION);
        write_u32(data, OFFSET_PAGE_SIZE, self.page_size as u32);
        write_u32(data, OFFSET_ROOT, self.root.0);
        write_u32(data, OFFSET_FREE_HEAD, self.free_list_head.0);
        page.seal();
        page
    }

    /// Parse and validate the metadata page.
    ///
    /// # Errors
    /// - `Error::CorruptPage` if the page is not a metadata page, has an
    ///   unknown version, or fails its checksum
    /// - `Error::PageSizeMismatch` if the file was written with a different
    ///   page size than `page.size()`
    pub fn decode(page: &Page) -> Result<Self> {
        let data = page.as_slice();
        let corrupt = |reason: &str| Error::corrupt(PageId::META, reason);

        if page.header().page_type != PageType::Meta
            || data[OFFSET_MAGIC..OFFSET_MAGIC + 8] != MAGIC
        {
            return Err(corrupt("not an index metadata page"));
        }

        let version = read_u32(data, OFFSET_VERSION);
        if version != FORMAT_VERSION {
            return Err(Error::corrupt(
                PageId::META,
                format!("unsupported format version {version}"),
            ));
        }

        let page_size = read_u32(data, OFFSET_PAGE_SIZE) as usize;
        if page_size != page.size() {
            return Err(Error::PageSizeMismatch {
                expected: page.size(),
                found: page_size,
            });
        }

        if !page.verify_checksum() {
            return Err(corrupt("checksum mismatch"));
        }

        Ok(Self {
            page_size,
            root: PageId(read_u32(data, OFFSET_ROOT)),
            free_list_head: PageId(read_u32(data, OFFSET_FREE_HEAD)),
        })
    }
}

/// Encode a page sitting on the free list.
pub fn encode_free_page(page_size: usize, next_free: PageId) -> Page {
    let mut page = Page::formatted(page_size, PageType::Free);
    write_u32(page.as_mut_slice(), OFFSET_NEXT_FREE, next_free.0);
    page.seal();
    page
}

/// Read the next link of a free page.
pub fn decode_free_page(page: &Page) -> Result<PageId> {
    if page.header().page_type != PageType::Free {
        return Err(Error::corrupt(PageId::INVALID, "expected a free page"));
    }
    if !page.verify_checksum() {
        return Err(Error::corrupt(PageId::INVALID, "checksum mismatch"));
    }
    Ok(PageId(read_u32(page.as_slice(), OFFSET_NEXT_FREE)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_roundtrip() {
        let mut meta = IndexMeta::new(512, PageId::new(1));
        meta.free_list_head = PageId::new(7);

        let page = meta.encode();
        assert_eq!(&page.as_slice()[5..13], b"BPTIDX\0\x01");
        assert_eq!(IndexMeta::decode(&page).unwrap(), meta);
    }

    #[test]
    fn test_meta_rejects_foreign_page() {
        assert!(matches!(
            IndexMeta::decode(&Page::new(512)),
            Err(Error::CorruptPage { .. })
        ));
    }

    #[test]
    fn test_meta_rejects_other_version() {
        let mut page = IndexMeta::new(256, PageId::new(1)).encode();
        write_u32(page.as_mut_slice(), OFFSET_VERSION, 99);
        page.seal();

        assert!(matches!(
            IndexMeta::decode(&page),
            Err(Error::CorruptPage { .. })
        ));
    }

    #[test]
    fn test_meta_detects_page_size_mismatch() {
        let mut page = IndexMeta::new(256, PageId::new(1)).encode();
        write_u32(page.as_mut_slice(), OFFSET_PAGE_SIZE, 4096);
        page.seal();

        assert!(matches!(
            IndexMeta::decode(&page),
            Err(Error::PageSizeMismatch {
                expected: 256,
                found: 4096
            })
        ));
    }

    #[test]
    fn test_free_page_roundtrip() {
        let page = encode_free_page(256, PageId::new(12));
        assert_eq!(decode_free_page(&page).unwrap(), PageId::new(12));

        let end = encode_free_page(256, PageId::INVALID);
        assert_eq!(decode_free_page(&end).unwrap(), PageId::INVALID);

        assert!(decode_free_page(&IndexMeta::new(256, PageId::new(1)).encode()).is_err());
    }
}

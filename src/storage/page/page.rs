//! Heap buffer holding one page of an index file.

use super::page_header::{PageHeader, PageType};

/// One page worth of bytes, sized by the file it belongs to.
///
/// Pages are built by formatting a blank buffer, filling the body, then
/// sealing it so the stored CRC covers the final bytes:
///
/// ```
/// use bptree_index::storage::page::{Page, PageType};
///
/// let mut page = Page::formatted(256, PageType::Leaf);
/// page.as_mut_slice()[32] = 0x2A;
/// assert!(!page.verify_checksum());
///
/// page.seal();
/// assert!(page.verify_checksum());
/// assert_eq!(page.header().page_type, PageType::Leaf);
/// ```
///
/// There is no production `Clone`; a page is copied only by re-reading it.
#[derive(Debug, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// All-zero page. Its tag reads as [`PageType::Invalid`].
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Blank page carrying `page_type` in its header.
    pub fn formatted(size: usize, page_type: PageType) -> Self {
        let mut page = Self::new(size);
        page.set_header(&PageHeader::new(page_type));
        page
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Store the CRC of the current contents. Any later write to the body
    /// invalidates it until the page is sealed again.
    pub fn seal(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::CHECKSUM_RANGE].copy_from_slice(&checksum.to_le_bytes());
    }

    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_is_blank() {
        let page = Page::new(200);
        assert_eq!(page.size(), 200);
        assert!(page.as_slice().iter().all(|&b| b == 0));
        assert_eq!(page.header().page_type, PageType::Invalid);
    }

    #[test]
    fn test_formatted_sets_only_the_tag() {
        let page = Page::formatted(128, PageType::Free);
        assert_eq!(page.header(), PageHeader::new(PageType::Free));
        assert_eq!(page.as_slice()[0], PageType::Free as u8);
        assert!(page.as_slice()[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_seal_tracks_body_writes() {
        let mut page = Page::formatted(512, PageType::Interior);
        page.as_mut_slice()[511] = 0x5A;
        assert!(!page.verify_checksum());

        page.seal();
        assert!(page.verify_checksum());
        let sealed = page.clone();

        page.as_mut_slice()[511] = 0x5B;
        assert!(!page.verify_checksum());
        assert!(sealed.verify_checksum());

        page.seal();
        assert_ne!(page.header().checksum, sealed.header().checksum);
    }

    #[test]
    fn test_retagging_breaks_seal() {
        let mut page = Page::formatted(64, PageType::Leaf);
        page.seal();
        let sealed = page.header();

        page.set_header(&PageHeader {
            page_type: PageType::Free,
            ..sealed
        });
        assert!(!page.verify_checksum());
    }
}

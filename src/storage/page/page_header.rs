//! Common prefix shared by every page of an index file.
//!
//! The first byte tags what the page holds; the next four carry a CRC32 of
//! the whole page. Node and metadata layouts start at [`PageHeader::SIZE`].

use std::ops::Range;

/// On-disk tag identifying what a page holds.
///
/// The discriminants are part of the file format and must not change.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    /// Never written, zeroed, or carrying an unknown tag.
    #[default]
    Invalid = 0,
    /// Page 0: magic, format version, page size, root and free-list head.
    Meta = 1,
    /// Routing node holding separators and child pointers.
    Interior = 2,
    /// Node holding `(key, rid)` entries, chained to its siblings.
    Leaf = 3,
    /// Released node waiting on the free list.
    Free = 4,
}

impl PageType {
    /// Decode a tag byte. Unknown tags map to [`PageType::Invalid`] so the
    /// caller can report corruption with the page number attached.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Meta,
            2 => PageType::Interior,
            3 => PageType::Leaf,
            4 => PageType::Free,
            _ => PageType::Invalid,
        }
    }

    /// True for the two node kinds a tree descent may land on.
    pub fn is_node(self) -> bool {
        matches!(self, PageType::Interior | PageType::Leaf)
    }
}

/// Decoded form of the 5-byte page prefix.
///
/// ```text
/// byte 0      page type tag
/// bytes 1..5  CRC32 (little-endian), computed with these bytes zeroed
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
}

impl PageHeader {
    pub const SIZE: usize = 5;

    const TAG: usize = 0;

    /// Bytes occupied by the stored checksum.
    pub const CHECKSUM_RANGE: Range<usize> = 1..5;

    /// Header for a freshly formatted page; the checksum is filled in when
    /// the page is sealed.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            checksum: 0,
        }
    }

    /// # Panics
    /// If `data` is shorter than [`PageHeader::SIZE`].
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "page shorter than its header");

        let mut crc = [0u8; 4];
        crc.copy_from_slice(&data[Self::CHECKSUM_RANGE]);
        Self {
            page_type: PageType::from_u8(data[Self::TAG]),
            checksum: u32::from_le_bytes(crc),
        }
    }

    /// # Panics
    /// If `data` is shorter than [`PageHeader::SIZE`].
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "page shorter than its header");

        data[Self::TAG] = self.page_type as u8;
        data[Self::CHECKSUM_RANGE].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// CRC32 of a full page, reading the checksum bytes as zero.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let Range { start, end } = Self::CHECKSUM_RANGE;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..start]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[end..]);
        hasher.finalize()
    }

    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stable() {
        for tag in [
            PageType::Invalid,
            PageType::Meta,
            PageType::Interior,
            PageType::Leaf,
            PageType::Free,
        ] {
            assert_eq!(PageType::from_u8(tag as u8), tag);
        }
        assert_eq!(PageType::Leaf as u8, 3);
        assert_eq!(PageType::from_u8(9), PageType::Invalid);
        assert_eq!(PageType::from_u8(u8::MAX), PageType::Invalid);
    }

    #[test]
    fn test_is_node() {
        assert!(PageType::Leaf.is_node());
        assert!(PageType::Interior.is_node());
        assert!(!PageType::Meta.is_node());
        assert!(!PageType::Free.is_node());
        assert!(!PageType::Invalid.is_node());
    }

    #[test]
    fn test_header_encoding() {
        let header = PageHeader {
            page_type: PageType::Meta,
            checksum: 0xA1B2_C3D4,
        };
        let mut page = vec![0u8; 64];
        header.write_to(&mut page);

        assert_eq!(&page[..PageHeader::SIZE], &[1, 0xD4, 0xC3, 0xB2, 0xA1]);
        assert!(page[PageHeader::SIZE..].iter().all(|&b| b == 0));
        assert_eq!(PageHeader::from_bytes(&page), header);
    }

    #[test]
    #[should_panic(expected = "page shorter than its header")]
    fn test_short_buffer_panics() {
        PageHeader::from_bytes(&[3, 0, 0]);
    }

    #[test]
    fn test_sealed_page_verifies() {
        let mut page = vec![0u8; 128];
        PageHeader::new(PageType::Leaf).write_to(&mut page);
        page[40..44].copy_from_slice(&7i32.to_le_bytes());

        let sealed = PageHeader {
            checksum: PageHeader::compute_checksum(&page),
            ..PageHeader::from_bytes(&page)
        };
        sealed.write_to(&mut page);

        let header = PageHeader::from_bytes(&page);
        assert!(header.verify_checksum(&page));

        page[41] ^= 0x10;
        assert!(!header.verify_checksum(&page));
    }

    #[test]
    fn test_tag_is_covered_by_checksum() {
        let mut page = vec![0u8; 128];
        let invalid = PageHeader::compute_checksum(&page);
        page[0] = PageType::Free as u8;
        assert_ne!(PageHeader::compute_checksum(&page), invalid);
    }
}

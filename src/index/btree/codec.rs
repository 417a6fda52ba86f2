//! Node page codec.
//!
//! Converts between [`Node`]s and fixed-size [`Page`]s.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     page type (Interior = 2, Leaf = 3)      ┐ PageHeader
//! 1       4     checksum (CRC32)                        ┘
//! 5       4     num_entries                             ┐ IndexDirectory
//! 9       4     free_space_offset                       ┘
//! 13      4     parent                                  ┐
//! 17      4     left_sibling                            │ FamilyDirectory
//! 21      4     right_sibling                           ┘
//! 25      ..    payload, up to free_space_offset
//! ..      ..    zeroes to the end of the page
//! ```
//!
//! Leaf payload: `num_entries` × `key | rid.page_num | rid.slot_num`.
//!
//! Interior payload: `child[0]`, then `num_entries` ×
//! `key | rid.page_num | rid.slot_num | child[i + 1]`.
//!
//! All integers are little-endian. Null page links are `0xFFFF_FFFF`.

use crate::common::{AttrType, Error, PageId, Result, Rid};
use crate::index::btree::node::{
    Family, InteriorNode, LeafNode, Node, NodeOps, CHILD_POINTER_SIZE,
};
use crate::index::key::IndexEntry;
use crate::storage::page::{Page, PageHeader, PageType};

const OFFSET_NUM_ENTRIES: usize = PageHeader::SIZE;
const OFFSET_FREE_SPACE: usize = PageHeader::SIZE + 4;
const OFFSET_PARENT: usize = PageHeader::SIZE + 8;
const OFFSET_LEFT: usize = PageHeader::SIZE + 12;
const OFFSET_RIGHT: usize = PageHeader::SIZE + 16;

/// Size of the fixed node header (page header + both directories).
pub const NODE_HEADER_SIZE: usize = PageHeader::SIZE + 20;

/// Smallest encoded entry (a fixed-width key plus a RID); bounds how many
/// entries a page can claim to hold.
const MIN_ENTRY_SIZE: usize = 4 + Rid::SIZE;

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Encodes and decodes node pages for one index.
///
/// The attribute type is needed because keys carry no type tag on disk.
#[derive(Debug, Clone, Copy)]
pub struct NodeCodec {
    page_size: usize,
    attr_type: AttrType,
}

impl NodeCodec {
    pub fn new(page_size: usize, attr_type: AttrType) -> Self {
        Self {
            page_size,
            attr_type,
        }
    }

    /// Payload bytes available in one page.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.page_size - NODE_HEADER_SIZE
    }

    /// Serialize a node into a fresh page.
    ///
    /// # Errors
    /// Returns `Error::PageOverflow` if the node doesn't fit in one page.
    pub fn encode(&self, node: &Node) -> Result<Page> {
        let payload_len = node.payload_len();
        if payload_len > self.capacity() {
            return Err(Error::PageOverflow {
                required: NODE_HEADER_SIZE + payload_len,
                capacity: self.page_size,
            });
        }

        let mut payload = Vec::with_capacity(payload_len);
        let page_type = match node {
            Node::Leaf(leaf) => {
                for entry in &leaf.entries {
                    entry.encode_into(&mut payload);
                }
                PageType::Leaf
            }
            Node::Interior(interior) => {
                payload.extend_from_slice(&interior.children[0].0.to_le_bytes());
                for (key, child) in interior.keys.iter().zip(&interior.children[1..]) {
                    key.encode_into(&mut payload);
                    payload.extend_from_slice(&child.0.to_le_bytes());
                }
                PageType::Interior
            }
        };
        debug_assert_eq!(payload.len(), payload_len);

        let free_space_offset = NODE_HEADER_SIZE + payload.len();
        let family = node.family();

        let mut page = Page::formatted(self.page_size, page_type);
        let data = page.as_mut_slice();
        write_u32(data, OFFSET_NUM_ENTRIES, node.entry_count() as u32);
        write_u32(data, OFFSET_FREE_SPACE, free_space_offset as u32);
        write_u32(data, OFFSET_PARENT, family.parent.0);
        write_u32(data, OFFSET_LEFT, family.left_sibling.0);
        write_u32(data, OFFSET_RIGHT, family.right_sibling.0);
        data[NODE_HEADER_SIZE..free_space_offset].copy_from_slice(&payload);
        page.seal();

        Ok(page)
    }

    /// Parse a node page.
    ///
    /// # Errors
    /// Returns `Error::CorruptPage` (with `PageId::INVALID`; callers attach
    /// the real page number) if the page fails any structural check.
    pub fn decode(&self, page: &Page) -> Result<Node> {
        let corrupt = |reason: String| Error::corrupt(PageId::INVALID, reason);
        let data = page.as_slice();

        if data.len() != self.page_size {
            return Err(corrupt(format!(
                "page is {} bytes, expected {}",
                data.len(),
                self.page_size
            )));
        }
        if !page.verify_checksum() {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let page_type = page.header().page_type;
        if !page_type.is_node() {
            return Err(corrupt(format!("expected a node page, found {:?}", page_type)));
        }

        let num_entries = read_u32(data, OFFSET_NUM_ENTRIES) as usize;
        let free_space_offset = read_u32(data, OFFSET_FREE_SPACE) as usize;
        if !(NODE_HEADER_SIZE..=self.page_size).contains(&free_space_offset) {
            return Err(corrupt(format!(
                "free space offset {} outside [{}, {}]",
                free_space_offset, NODE_HEADER_SIZE, self.page_size
            )));
        }

        let payload = &data[NODE_HEADER_SIZE..free_space_offset];
        if num_entries > payload.len() / MIN_ENTRY_SIZE {
            return Err(corrupt(format!(
                "{} entries can't fit in {} payload bytes",
                num_entries,
                payload.len()
            )));
        }

        let family = Family {
            parent: PageId(read_u32(data, OFFSET_PARENT)),
            left_sibling: PageId(read_u32(data, OFFSET_LEFT)),
            right_sibling: PageId(read_u32(data, OFFSET_RIGHT)),
        };

        let mut pos = 0;
        let node = if page_type == PageType::Leaf {
            let mut entries = Vec::with_capacity(num_entries);
            for i in 0..num_entries {
                let (entry, used) = IndexEntry::decode(self.attr_type, &payload[pos..])
                    .ok_or_else(|| corrupt(format!("entry {i} runs past free space")))?;
                entries.push(entry);
                pos += used;
            }
            Node::Leaf(LeafNode { family, entries })
        } else {
            if payload.len() < CHILD_POINTER_SIZE {
                return Err(corrupt("interior node without children".to_string()));
            }
            let mut children = Vec::with_capacity(num_entries + 1);
            let mut keys = Vec::with_capacity(num_entries);
            children.push(PageId(read_u32(payload, 0)));
            pos = CHILD_POINTER_SIZE;
            for i in 0..num_entries {
                let (key, used) = IndexEntry::decode(self.attr_type, &payload[pos..])
                    .ok_or_else(|| corrupt(format!("separator {i} runs past free space")))?;
                pos += used;
                if pos + CHILD_POINTER_SIZE > payload.len() {
                    return Err(corrupt(format!("child {} runs past free space", i + 1)));
                }
                keys.push(key);
                children.push(PageId(read_u32(payload, pos)));
                pos += CHILD_POINTER_SIZE;
            }
            Node::Interior(InteriorNode {
                family,
                keys,
                children,
            })
        };

        if pos != payload.len() {
            return Err(corrupt(format!(
                "payload ends at {} but free space offset is {}",
                NODE_HEADER_SIZE + pos,
                free_space_offset
            )));
        }

        Ok(node)
    }
}

//! Root-to-leaf descent.

use crate::common::{Error, PageId, Result};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::file_handle::IndexFileHandle;
use crate::index::btree::node::{InteriorNode, LeafNode, Node};
use crate::index::key::IndexEntry;

/// Upper bound on tree height; a descent deeper than this means the child
/// links form a cycle.
pub(crate) const MAX_DEPTH: usize = 64;

/// Walks from the root to a leaf, decoding one page per level.
///
/// The root page number is taken from the handle on every call, so a
/// navigator never follows a stale root after the tree grows or shrinks.
pub(crate) struct Navigator<'a> {
    file: &'a IndexFileHandle,
    codec: &'a NodeCodec,
}

impl<'a> Navigator<'a> {
    pub(crate) fn new(file: &'a IndexFileHandle, codec: &'a NodeCodec) -> Self {
        Self { file, codec }
    }

    /// Find the leaf whose key range contains `probe`.
    pub(crate) fn find_leaf_for(&self, probe: &IndexEntry) -> Result<(PageId, LeafNode)> {
        self.descend(self.file.root_page_id(), |node| node.child_index_for(probe))
    }

    /// Find the leftmost leaf of the whole tree.
    pub(crate) fn leftmost_leaf(&self) -> Result<(PageId, LeafNode)> {
        self.leftmost_leaf_under(self.file.root_page_id())
    }

    /// Find the leftmost leaf under `subtree`.
    pub(crate) fn leftmost_leaf_under(&self, subtree: PageId) -> Result<(PageId, LeafNode)> {
        self.descend(subtree, |_| 0)
    }

    /// Smallest entry stored under `subtree`, or `None` if its leftmost leaf
    /// is empty.
    pub(crate) fn leftmost_entry(&self, subtree: PageId) -> Result<Option<IndexEntry>> {
        let (_, leaf) = self.leftmost_leaf_under(subtree)?;
        Ok(leaf.entries.into_iter().next())
    }

    fn descend(
        &self,
        start: PageId,
        pick: impl Fn(&InteriorNode) -> usize,
    ) -> Result<(PageId, LeafNode)> {
        let mut page_id = start;
        for _ in 0..MAX_DEPTH {
            match self.file.read_node(page_id, self.codec)? {
                Node::Leaf(leaf) => return Ok((page_id, leaf)),
                Node::Interior(node) => {
                    let child = node.children[pick(&node)];
                    if !child.is_valid() {
                        return Err(Error::corrupt(page_id, "null child pointer"));
                    }
                    page_id = child;
                }
            }
        }
        Err(Error::corrupt(
            page_id,
            format!("descent exceeded {MAX_DEPTH} levels"),
        ))
    }
}

//! Insert and delete with split, borrow, merge and root changes.
//!
//! Every mutation edits one leaf in memory and hands it to [`TreeMutator::settle`],
//! a loop that writes the node back if it fits and is full enough, and
//! otherwise fixes it and moves on to the parent:
//!
//! ```text
//!            ┌──────────── encode(node) ────────────┐
//!            │                                      │
//!      PageOverflow                                 fits
//!            │                          ┌───────────┼─────────────┐
//!      split, push separator         root?    underflow?        neither
//!      into parent (or grow a        collapse   borrow / merge     write,
//!      new root)                     if empty   with a sibling     done
//!            │                                      │
//!            └──────── continue with parent ────────┘
//! ```
//!
//! A node underflows when its payload drops below a quarter of a page's
//! payload capacity. Keys are capped at a quarter of the capacity (minus the
//! interior per-entry overhead), which guarantees that a split produces two
//! halves that fit and that two siblings unable to lend can always merge.

use log::debug;

use crate::common::{Error, PageId, Result, Rid};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::file_handle::IndexFileHandle;
use crate::index::btree::navigator::{Navigator, MAX_DEPTH};
use crate::index::btree::node::{
    Family, InteriorNode, LeafNode, Node, NodeOps, CHILD_POINTER_SIZE,
};
use crate::index::key::IndexEntry;

/// Bytes an interior separator costs beyond its key.
const INTERIOR_ENTRY_OVERHEAD: usize = Rid::SIZE + CHILD_POINTER_SIZE;

/// Largest encoded key an index with this codec accepts.
pub(crate) fn max_key_len(codec: &NodeCodec) -> usize {
    (codec.capacity() / 4).saturating_sub(INTERIOR_ENTRY_OVERHEAD)
}

/// Index at which to cut a node whose entries have the given sizes.
///
/// The first index where the left part reaches half the bytes, kept within
/// `[1, n - 1]` so both halves are non-empty. For fixed-width keys this is
/// the count median.
fn split_point(sizes: &[usize]) -> usize {
    let total: usize = sizes.iter().sum();
    let mut acc = 0;
    for (i, size) in sizes.iter().enumerate() {
        if acc * 2 >= total {
            return i.clamp(1, sizes.len().saturating_sub(1).max(1));
        }
        acc += size;
    }
    sizes.len().saturating_sub(1).max(1)
}

/// Which end of a sibling an entry is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    First,
    Last,
}

/// Applies structural changes to one open index.
pub(crate) struct TreeMutator<'a> {
    file: &'a mut IndexFileHandle,
    codec: NodeCodec,
}

impl<'a> TreeMutator<'a> {
    pub(crate) fn new(file: &'a mut IndexFileHandle, codec: NodeCodec) -> Self {
        Self { file, codec }
    }

    fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self.file, &self.codec)
    }

    fn min_payload(&self) -> usize {
        self.codec.capacity() / 4
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Insert an entry in sorted position.
    ///
    /// # Errors
    /// Returns `Error::DuplicateEntry` if exactly this `(key, rid)` exists.
    pub(crate) fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        let (leaf_id, mut leaf) = self.navigator().find_leaf_for(&entry)?;
        let pos = leaf.lower_bound(&entry);
        if leaf.entries.get(pos) == Some(&entry) {
            return Err(Error::DuplicateEntry);
        }
        leaf.insert_at(pos, entry);
        self.settle(leaf_id, Node::Leaf(leaf))
    }

    /// Remove exactly `entry`.
    ///
    /// # Errors
    /// Returns `Error::EntryNotFound` without touching the tree if no entry
    /// with this key and RID exists.
    pub(crate) fn delete(&mut self, entry: &IndexEntry) -> Result<()> {
        let (leaf_id, mut leaf) = self.navigator().find_leaf_for(entry)?;
        let pos = leaf.find(entry).ok_or(Error::EntryNotFound)?;
        leaf.remove_at(pos);
        self.settle(leaf_id, Node::Leaf(leaf))?;

        // Only the first entry of a leaf can also be a separator.
        if pos == 0 {
            self.refresh_separator(entry)?;
        }
        Ok(())
    }

    // ========================================================================
    // Settle loop
    // ========================================================================

    /// Write `node` back, splitting, rebalancing or collapsing the root as
    /// needed, and keep going upward until a level needs no change.
    fn settle(&mut self, mut page_id: PageId, mut node: Node) -> Result<()> {
        loop {
            let page = match self.codec.encode(&node) {
                Ok(page) => page,
                Err(Error::PageOverflow { .. }) => {
                    (page_id, node) = self.split(page_id, node)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if node.is_root() {
                if let Node::Interior(root) = &node {
                    if root.keys.is_empty() {
                        return self.collapse_root(page_id, root.children[0]);
                    }
                }
                return self.file.write_page(page_id, &page);
            }

            if node.payload_len() >= self.min_payload() {
                return self.file.write_page(page_id, &page);
            }

            match self.rebalance(page_id, node)? {
                Some((parent_id, parent)) => {
                    page_id = parent_id;
                    node = Node::Interior(parent);
                }
                None => return Ok(()),
            }
        }
    }

    // ========================================================================
    // Split
    // ========================================================================

    /// Split an overflowing node in two and return the node that now has to
    /// absorb the separator: the existing parent, or a new root.
    ///
    /// Both halves are written before returning; the returned node is not.
    fn split(&mut self, page_id: PageId, node: Node) -> Result<(PageId, Node)> {
        if node.entry_count() < 2 {
            return Err(Error::corrupt(page_id, "overflowing node has fewer than two keys"));
        }
        let right_id = self.file.allocate_page()?;

        let (mut left, mut right, separator) = match node {
            Node::Leaf(mut left) => {
                let sizes: Vec<usize> = left.entries.iter().map(IndexEntry::encoded_len).collect();
                let entries = left.entries.split_off(split_point(&sizes));
                // Leaf splits copy the first right key up.
                let separator = entries[0].clone();
                let right = LeafNode {
                    family: Family {
                        parent: left.family.parent,
                        left_sibling: page_id,
                        right_sibling: left.family.right_sibling,
                    },
                    entries,
                };
                (Node::Leaf(left), Node::Leaf(right), separator)
            }
            Node::Interior(mut left) => {
                let sizes: Vec<usize> = left
                    .keys
                    .iter()
                    .map(|k| k.encoded_len() + CHILD_POINTER_SIZE)
                    .collect();
                let last = sizes.len().saturating_sub(2).max(1);
                let mid = split_point(&sizes).clamp(1, last);

                // Interior splits move the middle key up.
                let mut keys = left.keys.split_off(mid);
                let separator = keys.remove(0);
                let children = left.children.split_off(mid + 1);
                for &child in &children {
                    self.set_parent(child, right_id)?;
                }
                let right = InteriorNode {
                    family: Family {
                        parent: left.family.parent,
                        left_sibling: page_id,
                        right_sibling: left.family.right_sibling,
                    },
                    keys,
                    children,
                };
                (Node::Interior(left), Node::Interior(right), separator)
            }
        };

        if let Some(next) = left.family().right_sibling.valid() {
            self.update_family(next, |f| f.left_sibling = right_id)?;
        }
        left.family_mut().right_sibling = right_id;

        debug!(
            "split {} at {}: {} entries stay, {} move to {}",
            page_id,
            separator,
            left.entry_count(),
            right.entry_count(),
            right_id
        );

        match left.family().parent.valid() {
            None => {
                let root_id = self.file.allocate_page()?;
                left.family_mut().parent = root_id;
                right.family_mut().parent = root_id;
                self.write(page_id, &left)?;
                self.write(right_id, &right)?;

                let mut root = InteriorNode::new(Family::ORPHAN, page_id);
                root.insert_at(0, separator, right_id);
                self.file.set_root(root_id)?;
                debug!("tree grows: new root {}", root_id);
                Ok((root_id, Node::Interior(root)))
            }
            Some(parent_id) => {
                self.write(page_id, &left)?;
                self.write(right_id, &right)?;

                let mut parent = self.read_interior(parent_id)?;
                let idx = self.child_position(&parent, parent_id, page_id)?;
                parent.insert_at(idx, separator, right_id);
                Ok((parent_id, Node::Interior(parent)))
            }
        }
    }

    // ========================================================================
    // Underflow
    // ========================================================================

    /// Fix an underflowing non-root node by borrowing from or merging with a
    /// sibling under the same parent.
    ///
    /// Writes `node` (and any sibling it touched) and returns the modified,
    /// unwritten parent; returns `None` when the parent is unchanged.
    fn rebalance(
        &mut self,
        page_id: PageId,
        node: Node,
    ) -> Result<Option<(PageId, InteriorNode)>> {
        let parent_id = node.family().parent;
        let mut parent = self.read_interior(parent_id)?;
        let idx = self.child_position(&parent, parent_id, page_id)?;

        let mut left = None;
        if let Some(left_id) = idx.checked_sub(1).map(|i| parent.children[i]) {
            let sibling = self.read_sibling(left_id, &node)?;
            if self.can_lend(&sibling, End::Last) {
                self.borrow_from_left(&mut parent, idx, left_id, sibling, page_id, node)?;
                return Ok(Some((parent_id, parent)));
            }
            left = Some((left_id, sibling));
        }

        let mut right = None;
        if let Some(right_id) = parent.children.get(idx + 1).copied() {
            let sibling = self.read_sibling(right_id, &node)?;
            if self.can_lend(&sibling, End::First) {
                self.borrow_from_right(&mut parent, idx, page_id, node, right_id, sibling)?;
                return Ok(Some((parent_id, parent)));
            }
            right = Some((right_id, sibling));
        }

        let (sep_idx, (left_id, left), (right_id, right)) = match (left, right) {
            (Some(left), _) => (idx - 1, left, (page_id, node)),
            (None, Some(right)) => (idx, (page_id, node), right),
            (None, None) => {
                // Only child; the parent itself is about to be fixed.
                self.write(page_id, &node)?;
                return Ok(None);
            }
        };

        let merged_len = left.payload_len()
            + right.payload_len()
            + match &left {
                Node::Interior(_) => parent.keys[sep_idx].encoded_len(),
                Node::Leaf(_) => 0,
            };
        if merged_len > self.codec.capacity() {
            // Unreachable with capped key sizes; leave both halves valid.
            self.write(left_id, &left)?;
            self.write(right_id, &right)?;
            return Ok(None);
        }

        self.merge(&mut parent, sep_idx, left_id, left, right_id, right)?;
        Ok(Some((parent_id, parent)))
    }

    /// Whether `sibling` stays at or above the threshold after giving up the
    /// entry at `end`.
    fn can_lend(&self, sibling: &Node, end: End) -> bool {
        let count = sibling.entry_count();
        if count == 0 {
            return false;
        }
        let i = match end {
            End::First => 0,
            End::Last => count - 1,
        };
        let moved = match sibling {
            Node::Leaf(_) => sibling.key_at(i).encoded_len(),
            Node::Interior(_) => sibling.key_at(i).encoded_len() + CHILD_POINTER_SIZE,
        };
        sibling.payload_len().saturating_sub(moved) >= self.min_payload()
    }

    fn borrow_from_left(
        &mut self,
        parent: &mut InteriorNode,
        idx: usize,
        left_id: PageId,
        left: Node,
        page_id: PageId,
        node: Node,
    ) -> Result<()> {
        let (left, node) = match (left, node) {
            (Node::Leaf(mut left), Node::Leaf(mut node)) => {
                let moved = left.entries.pop().ok_or_else(|| Error::corrupt(left_id, "empty leaf"))?;
                parent.keys[idx - 1] = moved.clone();
                node.entries.insert(0, moved);
                (Node::Leaf(left), Node::Leaf(node))
            }
            (Node::Interior(mut left), Node::Interior(mut node)) => {
                let moved_key = left.keys.pop().ok_or_else(|| Error::corrupt(left_id, "no separators"))?;
                let moved_child = left.children.pop().ok_or_else(|| Error::corrupt(left_id, "no children"))?;
                let down = std::mem::replace(&mut parent.keys[idx - 1], moved_key);
                node.keys.insert(0, down);
                node.children.insert(0, moved_child);
                self.set_parent(moved_child, page_id)?;
                (Node::Interior(left), Node::Interior(node))
            }
            _ => return Err(Error::corrupt(left_id, "sibling on a different level")),
        };

        debug!("{} borrows one entry from left sibling {}", page_id, left_id);
        self.write(left_id, &left)?;
        self.write(page_id, &node)
    }

    fn borrow_from_right(
        &mut self,
        parent: &mut InteriorNode,
        idx: usize,
        page_id: PageId,
        node: Node,
        right_id: PageId,
        right: Node,
    ) -> Result<()> {
        let (node, right) = match (node, right) {
            (Node::Leaf(mut node), Node::Leaf(mut right)) => {
                node.entries.push(right.remove_at(0));
                let first = right
                    .entries
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::corrupt(right_id, "sibling emptied by borrow"))?;
                parent.keys[idx] = first;
                (Node::Leaf(node), Node::Leaf(right))
            }
            (Node::Interior(mut node), Node::Interior(mut right)) => {
                let moved_key = right.keys.remove(0);
                let moved_child = right.children.remove(0);
                let down = std::mem::replace(&mut parent.keys[idx], moved_key);
                node.keys.push(down);
                node.children.push(moved_child);
                self.set_parent(moved_child, page_id)?;
                (Node::Interior(node), Node::Interior(right))
            }
            _ => return Err(Error::corrupt(right_id, "sibling on a different level")),
        };

        debug!("{} borrows one entry from right sibling {}", page_id, right_id);
        self.write(right_id, &right)?;
        self.write(page_id, &node)
    }

    /// Fold `right` into `left`, drop separator `sep_idx` from the parent and
    /// free the right page.
    fn merge(
        &mut self,
        parent: &mut InteriorNode,
        sep_idx: usize,
        left_id: PageId,
        left: Node,
        right_id: PageId,
        right: Node,
    ) -> Result<()> {
        let (separator, removed) = parent.remove_at(sep_idx);
        if removed != right_id {
            return Err(Error::corrupt(
                right_id,
                format!("parent links {removed} where its sibling should be"),
            ));
        }

        let merged = match (left, right) {
            (Node::Leaf(mut left), Node::Leaf(right)) => {
                left.entries.extend(right.entries);
                left.family.right_sibling = right.family.right_sibling;
                Node::Leaf(left)
            }
            (Node::Interior(mut left), Node::Interior(right)) => {
                // The parent separator comes down between the two key runs.
                left.keys.push(separator);
                left.keys.extend(right.keys);
                for &child in &right.children {
                    self.set_parent(child, left_id)?;
                }
                left.children.extend(right.children);
                left.family.right_sibling = right.family.right_sibling;
                Node::Interior(left)
            }
            _ => return Err(Error::corrupt(right_id, "sibling on a different level")),
        };

        if let Some(next) = merged.family().right_sibling.valid() {
            self.update_family(next, |f| f.left_sibling = left_id)?;
        }

        debug!("merged {} into {}", right_id, left_id);
        self.write(left_id, &merged)?;
        self.file.release_page(right_id)
    }

    /// Replace a root that has a single child with that child.
    fn collapse_root(&mut self, root_id: PageId, child_id: PageId) -> Result<()> {
        self.update_family(child_id, |f| f.parent = PageId::INVALID)?;
        self.file.set_root(child_id)?;
        self.file.release_page(root_id)?;
        debug!("tree shrinks: root {} replaced by {}", root_id, child_id);
        Ok(())
    }

    /// After `deleted` left the tree, replace the separator still equal to it
    /// (if any) with the new minimum of that separator's right subtree.
    fn refresh_separator(&mut self, deleted: &IndexEntry) -> Result<()> {
        let mut page_id = self.file.root_page_id();
        for _ in 0..MAX_DEPTH {
            let mut node = match self.read_node(page_id)? {
                Node::Leaf(_) => return Ok(()),
                Node::Interior(node) => node,
            };
            let idx = node.child_index_for(deleted);
            if idx > 0 && node.keys[idx - 1] == *deleted {
                let Some(min) = self.navigator().leftmost_entry(node.children[idx])? else {
                    return Ok(());
                };
                debug!("separator {} in {} becomes {}", deleted, page_id, min);
                node.keys[idx - 1] = min;
                return self.settle(page_id, Node::Interior(node));
            }
            page_id = node.children[idx];
        }
        Err(Error::corrupt(page_id, format!("descent exceeded {MAX_DEPTH} levels")))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn read_node(&self, page_id: PageId) -> Result<Node> {
        self.file.read_node(page_id, &self.codec)
    }

    fn read_interior(&self, page_id: PageId) -> Result<InteriorNode> {
        match self.read_node(page_id)? {
            Node::Interior(node) => Ok(node),
            Node::Leaf(_) => Err(Error::corrupt(page_id, "parent link points at a leaf")),
        }
    }

    fn read_sibling(&self, page_id: PageId, like: &Node) -> Result<Node> {
        let sibling = self.read_node(page_id)?;
        if sibling.node_type() != like.node_type() {
            return Err(Error::corrupt(page_id, "sibling on a different level"));
        }
        Ok(sibling)
    }

    fn child_position(&self, parent: &InteriorNode, parent_id: PageId, child: PageId) -> Result<usize> {
        parent.position_of_child(child).ok_or_else(|| {
            Error::corrupt(parent_id, format!("{child} names this page as parent but is not a child"))
        })
    }

    fn write(&mut self, page_id: PageId, node: &Node) -> Result<()> {
        self.file.write_node(page_id, node, &self.codec)
    }

    fn update_family(&mut self, page_id: PageId, edit: impl FnOnce(&mut Family)) -> Result<()> {
        let mut node = self.read_node(page_id)?;
        edit(node.family_mut());
        self.write(page_id, &node)
    }

    fn set_parent(&mut self, child: PageId, parent: PageId) -> Result<()> {
        self.update_family(child, |f| f.parent = parent)
    }
}

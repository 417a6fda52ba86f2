//! In-memory B+-tree nodes.
//!
//! Nodes are plain data: the [`codec`](super::codec) turns them into pages and
//! back, and the mutation engine edits them between a read and a write.
//! Parent and sibling links are page numbers, never live references, so a
//! page can be rewritten between any two accesses.

use crate::common::PageId;
use crate::index::key::IndexEntry;

/// Bytes an interior node spends on one child pointer.
pub(crate) const CHILD_POINTER_SIZE: usize = 4;

/// Which shape a node page decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Interior,
    Leaf,
}

/// Family links stored in every node page.
///
/// Leaves form a doubly linked chain in key order. Interior nodes on the same
/// level are chained the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    pub parent: PageId,
    pub left_sibling: PageId,
    pub right_sibling: PageId,
}

impl Family {
    /// Links of a node with no parent and no siblings (a root).
    pub const ORPHAN: Family = Family {
        parent: PageId::INVALID,
        left_sibling: PageId::INVALID,
        right_sibling: PageId::INVALID,
    };
}

impl Default for Family {
    fn default() -> Self {
        Self::ORPHAN
    }
}

/// Capabilities shared by both node shapes.
pub trait NodeOps {
    fn node_type(&self) -> NodeType;
    fn family(&self) -> &Family;
    fn family_mut(&mut self) -> &mut Family;
    /// Number of keys (leaf entries or interior separators).
    fn entry_count(&self) -> usize;
    fn key_at(&self, i: usize) -> &IndexEntry;
    /// Bytes the node's payload occupies after the page headers.
    fn payload_len(&self) -> usize;

    fn is_root(&self) -> bool {
        !self.family().parent.is_valid()
    }
}

/// A leaf: ordered `(key, rid)` entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeafNode {
    pub family: Family,
    pub entries: Vec<IndexEntry>,
}

impl LeafNode {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            entries: Vec::new(),
        }
    }

    pub fn insert_at(&mut self, i: usize, entry: IndexEntry) {
        self.entries.insert(i, entry);
    }

    pub fn remove_at(&mut self, i: usize) -> IndexEntry {
        self.entries.remove(i)
    }

    /// Index of the first entry `>= probe`.
    pub fn lower_bound(&self, probe: &IndexEntry) -> usize {
        self.entries.partition_point(|e| e < probe)
    }

    /// Position of exactly `probe`, if present.
    pub fn find(&self, probe: &IndexEntry) -> Option<usize> {
        let i = self.lower_bound(probe);
        (self.entries.get(i) == Some(probe)).then_some(i)
    }
}

impl NodeOps for LeafNode {
    fn node_type(&self) -> NodeType {
        NodeType::Leaf
    }

    fn family(&self) -> &Family {
        &self.family
    }

    fn family_mut(&mut self) -> &mut Family {
        &mut self.family
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn key_at(&self, i: usize) -> &IndexEntry {
        &self.entries[i]
    }

    fn payload_len(&self) -> usize {
        self.entries.iter().map(IndexEntry::encoded_len).sum()
    }
}

/// An interior node: `n` separators and `n + 1` children.
///
/// Every entry under `children[i]` is `>= keys[i - 1]` and `< keys[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteriorNode {
    pub family: Family,
    pub keys: Vec<IndexEntry>,
    pub children: Vec<PageId>,
}

impl InteriorNode {
    /// A node with a single child and no separators.
    pub fn new(family: Family, first_child: PageId) -> Self {
        Self {
            family,
            keys: Vec::new(),
            children: vec![first_child],
        }
    }

    /// Insert `separator` at `i` with `right_child` directly to its right.
    pub fn insert_at(&mut self, i: usize, separator: IndexEntry, right_child: PageId) {
        self.keys.insert(i, separator);
        self.children.insert(i + 1, right_child);
    }

    /// Remove separator `i` and the child to its right.
    pub fn remove_at(&mut self, i: usize) -> (IndexEntry, PageId) {
        let key = self.keys.remove(i);
        let child = self.children.remove(i + 1);
        (key, child)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Index of the child whose range contains `probe`.
    ///
    /// That is the position of the smallest separator `> probe`, or the last
    /// child when no separator is larger.
    pub fn child_index_for(&self, probe: &IndexEntry) -> usize {
        self.keys.partition_point(|k| k <= probe)
    }

    pub fn position_of_child(&self, page_id: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == page_id)
    }
}

impl NodeOps for InteriorNode {
    fn node_type(&self) -> NodeType {
        NodeType::Interior
    }

    fn family(&self) -> &Family {
        &self.family
    }

    fn family_mut(&mut self) -> &mut Family {
        &mut self.family
    }

    fn entry_count(&self) -> usize {
        self.keys.len()
    }

    fn key_at(&self, i: usize) -> &IndexEntry {
        &self.keys[i]
    }

    fn payload_len(&self) -> usize {
        self.children.len() * CHILD_POINTER_SIZE
            + self.keys.iter().map(IndexEntry::encoded_len).sum::<usize>()
    }
}

/// A decoded node page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Interior(InteriorNode),
    Leaf(LeafNode),
}

impl Node {
    fn ops(&self) -> &dyn NodeOps {
        match self {
            Node::Interior(n) => n,
            Node::Leaf(n) => n,
        }
    }

    fn ops_mut(&mut self) -> &mut dyn NodeOps {
        match self {
            Node::Interior(n) => n,
            Node::Leaf(n) => n,
        }
    }
}

impl NodeOps for Node {
    fn node_type(&self) -> NodeType {
        self.ops().node_type()
    }

    fn family(&self) -> &Family {
        self.ops().family()
    }

    fn family_mut(&mut self) -> &mut Family {
        self.ops_mut().family_mut()
    }

    fn entry_count(&self) -> usize {
        self.ops().entry_count()
    }

    fn key_at(&self, i: usize) -> &IndexEntry {
        self.ops().key_at(i)
    }

    fn payload_len(&self) -> usize {
        self.ops().payload_len()
    }
}

impl From<LeafNode> for Node {
    fn from(node: LeafNode) -> Self {
        Node::Leaf(node)
    }
}

impl From<InteriorNode> for Node {
    fn from(node: InteriorNode) -> Self {
        Node::Interior(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Rid;
    use crate::index::key::Key;

    fn entry(k: i32, slot: u32) -> IndexEntry {
        IndexEntry::new(Key::Int(k), Rid::new(0, slot))
    }

    #[test]
    fn test_leaf_insert_remove() {
        let mut leaf = LeafNode::new(Family::ORPHAN);
        leaf.insert_at(0, entry(5, 0));
        leaf.insert_at(0, entry(1, 1));
        leaf.insert_at(2, entry(9, 2));

        assert_eq!(leaf.entry_count(), 3);
        assert_eq!(leaf.key_at(1), &entry(5, 0));
        assert_eq!(leaf.remove_at(0), entry(1, 1));
        assert_eq!(leaf.entry_count(), 2);
        assert_eq!(leaf.payload_len(), 2 * 12);
    }

    #[test]
    fn test_leaf_search_with_duplicates() {
        let mut leaf = LeafNode::new(Family::ORPHAN);
        leaf.entries = vec![entry(1, 0), entry(3, 1), entry(3, 4), entry(5, 2)];

        assert_eq!(leaf.lower_bound(&entry(3, 0)), 1);
        assert_eq!(leaf.lower_bound(&entry(3, 2)), 2);
        assert_eq!(leaf.lower_bound(&entry(6, 0)), 4);
        assert_eq!(leaf.find(&entry(3, 4)), Some(2));
        assert_eq!(leaf.find(&entry(3, 3)), None);
    }

    #[test]
    fn test_interior_routing() {
        let mut node = InteriorNode::new(Family::ORPHAN, PageId::new(10));
        node.insert_at(0, entry(10, 0), PageId::new(11));
        node.insert_at(1, entry(20, 0), PageId::new(12));

        assert_eq!(node.child_count(), 3);
        assert_eq!(node.child_index_for(&entry(5, 0)), 0);
        // A probe equal to a separator belongs to the right child.
        assert_eq!(node.child_index_for(&entry(10, 0)), 1);
        assert_eq!(node.child_index_for(&entry(19, 9)), 1);
        assert_eq!(node.child_index_for(&entry(25, 0)), 2);
        assert_eq!(node.position_of_child(PageId::new(12)), Some(2));
        assert_eq!(node.payload_len(), 3 * 4 + 2 * 12);
    }

    #[test]
    fn test_interior_remove_drops_right_child() {
        let mut node = InteriorNode::new(Family::ORPHAN, PageId::new(1));
        node.insert_at(0, entry(10, 0), PageId::new(2));
        node.insert_at(1, entry(20, 0), PageId::new(3));

        let (key, child) = node.remove_at(0);
        assert_eq!(key, entry(10, 0));
        assert_eq!(child, PageId::new(2));
        assert_eq!(node.children, vec![PageId::new(1), PageId::new(3)]);
    }

    #[test]
    fn test_node_dispatch() {
        let mut node = Node::from(LeafNode::new(Family::ORPHAN));
        assert_eq!(node.node_type(), NodeType::Leaf);
        assert!(node.is_root());

        node.family_mut().parent = PageId::new(4);
        assert!(!node.is_root());
        assert_eq!(node.family().parent, PageId::new(4));
    }
}

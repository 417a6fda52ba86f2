//! Full structural check of an index tree.
//!
//! Walks every reachable page and verifies:
//! - each non-root node's parent link names the interior node that points at
//!   it, and no page is reachable twice
//! - the root alone has a null parent
//! - entries are strictly increasing and lie inside the key range the parent
//!   routes to them
//! - every separator equals the smallest entry of its right subtree
//! - all leaves sit at the same depth and no non-root node is empty
//! - the sibling links on every level form a doubly linked chain in key order
//! - every page is either the metadata page, reachable, or on the free list

use std::collections::HashSet;

use crate::common::{Error, PageId, Result};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::file_handle::IndexFileHandle;
use crate::index::btree::navigator::MAX_DEPTH;
use crate::index::btree::node::{Family, Node, NodeOps};
use crate::index::key::IndexEntry;

/// Size figures gathered by a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeShape {
    /// Levels from root to leaves; a lone root leaf has height 1.
    pub height: usize,
    pub interior_nodes: usize,
    pub leaf_nodes: usize,
    pub entries: usize,
    pub free_pages: usize,
}

/// Check the tree behind `file`.
///
/// # Errors
/// Returns `Error::CorruptPage` naming the first page found to break an
/// invariant, or any read/decode error.
pub(crate) fn check_tree(file: &IndexFileHandle, codec: &NodeCodec) -> Result<TreeShape> {
    let mut checker = Checker {
        file,
        codec,
        visited: HashSet::new(),
        levels: Vec::new(),
        leaf_depth: None,
        shape: TreeShape::default(),
    };
    let root = file.root_page_id();
    checker.walk(root, PageId::INVALID, 0, None, None)?;
    checker.check_sibling_chains()?;

    let free = file.free_pages()?;
    if let Some(&page_id) = free.iter().find(|p| checker.visited.contains(p)) {
        return Err(Error::corrupt(page_id, "page is both in the tree and on the free list"));
    }
    checker.shape.free_pages = free.len();
    checker.shape.height = checker.levels.len();

    let accounted = 1 + checker.visited.len() + free.len();
    if accounted != file.page_count() as usize {
        return Err(Error::corrupt(
            PageId::META,
            format!(
                "{} pages in file but {} accounted for",
                file.page_count(),
                accounted
            ),
        ));
    }
    Ok(checker.shape)
}

struct Checker<'a> {
    file: &'a IndexFileHandle,
    codec: &'a NodeCodec,
    visited: HashSet<PageId>,
    /// Nodes of each level, left to right.
    levels: Vec<Vec<(PageId, Family)>>,
    leaf_depth: Option<usize>,
    shape: TreeShape,
}

impl Checker<'_> {
    /// Check the subtree at `page_id` and return its smallest entry.
    fn walk(
        &mut self,
        page_id: PageId,
        parent: PageId,
        depth: usize,
        low: Option<&IndexEntry>,
        high: Option<&IndexEntry>,
    ) -> Result<Option<IndexEntry>> {
        let fail = |reason: String| Err(Error::corrupt(page_id, reason));

        if depth >= MAX_DEPTH {
            return fail(format!("tree deeper than {MAX_DEPTH} levels"));
        }
        if !self.visited.insert(page_id) {
            return fail("page reachable more than once".to_string());
        }

        let node = self.file.read_node(page_id, self.codec)?;
        let family = *node.family();
        if family.parent != parent {
            return fail(format!("parent link {} but referenced by {}", family.parent, parent));
        }
        let is_root = !parent.is_valid();
        if !is_root && node.entry_count() == 0 {
            return fail("non-root node is empty".to_string());
        }

        if self.levels.len() <= depth {
            self.levels.push(Vec::new());
        }
        self.levels[depth].push((page_id, family));

        match node {
            Node::Leaf(leaf) => {
                match self.leaf_depth {
                    Some(d) if d != depth => {
                        return fail(format!("leaf at depth {depth}, others at {d}"));
                    }
                    _ => self.leaf_depth = Some(depth),
                }
                self.check_range(page_id, &leaf.entries, low, high)?;
                self.shape.leaf_nodes += 1;
                self.shape.entries += leaf.entries.len();
                Ok(leaf.entries.into_iter().next())
            }
            Node::Interior(node) => {
                if node.keys.is_empty() {
                    return fail("interior node without separators".to_string());
                }
                if node.child_count() != node.keys.len() + 1 {
                    return fail(format!(
                        "{} separators but {} children",
                        node.keys.len(),
                        node.child_count()
                    ));
                }
                self.check_range(page_id, &node.keys, low, high)?;
                self.shape.interior_nodes += 1;

                let mut smallest = None;
                for (i, &child) in node.children.iter().enumerate() {
                    let child_low = if i == 0 { low } else { Some(&node.keys[i - 1]) };
                    let child_high = node.keys.get(i).or(high);
                    let min = self.walk(child, page_id, depth + 1, child_low, child_high)?;
                    if i == 0 {
                        smallest = min;
                    } else if min.as_ref() != Some(&node.keys[i - 1]) {
                        return fail(format!(
                            "separator {} is not the minimum of child {}",
                            node.keys[i - 1],
                            child
                        ));
                    }
                }
                Ok(smallest)
            }
        }
    }

    /// Entries strictly increasing and inside `[low, high)`.
    fn check_range(
        &self,
        page_id: PageId,
        entries: &[IndexEntry],
        low: Option<&IndexEntry>,
        high: Option<&IndexEntry>,
    ) -> Result<()> {
        if !entries.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::corrupt(page_id, "entries out of order"));
        }
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
            return Ok(());
        };
        if low.is_some_and(|low| first < low) || high.is_some_and(|high| last >= high) {
            return Err(Error::corrupt(
                page_id,
                format!("entries {first}..={last} outside the range routed here"),
            ));
        }
        Ok(())
    }

    fn check_sibling_chains(&self) -> Result<()> {
        for level in &self.levels {
            for (i, (page_id, family)) in level.iter().enumerate() {
                let left = i.checked_sub(1).map_or(PageId::INVALID, |j| level[j].0);
                let right = level.get(i + 1).map_or(PageId::INVALID, |n| n.0);
                if family.left_sibling != left || family.right_sibling != right {
                    return Err(Error::corrupt(
                        *page_id,
                        format!(
                            "sibling links ({}, {}) but neighbours are ({}, {})",
                            family.left_sibling, family.right_sibling, left, right
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

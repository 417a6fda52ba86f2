//! Human-readable pre-order dump of a tree.
//!
//! ```text
//! {"keys": ["3"],
//! "children": [
//!     {"keys": ["1:[(1,1)]","2:[(1,2),(4,0)]"]},
//!     {"keys": ["3:[(1,3)]","5:[(2,0)]"]}
//! ]}
//! ```
//!
//! Interior nodes list the key of each separator. Leaves list each distinct
//! key once with all its RIDs.

use crate::common::{Error, PageId, Result};
use crate::index::btree::codec::NodeCodec;
use crate::index::btree::file_handle::IndexFileHandle;
use crate::index::btree::navigator::MAX_DEPTH;
use crate::index::btree::node::{LeafNode, Node};

const INDENT: &str = "    ";

pub(crate) fn dump_tree(file: &IndexFileHandle, codec: &NodeCodec) -> Result<String> {
    let mut out = String::new();
    dump_node(file, codec, file.root_page_id(), 0, &mut out)?;
    out.push('\n');
    Ok(out)
}

fn dump_node(
    file: &IndexFileHandle,
    codec: &NodeCodec,
    page_id: PageId,
    depth: usize,
    out: &mut String,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::corrupt(page_id, format!("tree deeper than {MAX_DEPTH} levels")));
    }
    let indent = INDENT.repeat(depth);

    match file.read_node(page_id, codec)? {
        Node::Leaf(leaf) => {
            out.push_str(&indent);
            out.push_str("{\"keys\": [");
            out.push_str(&leaf_keys(&leaf));
            out.push_str("]}");
        }
        Node::Interior(node) => {
            let keys: Vec<String> = node.keys.iter().map(|s| format!("\"{}\"", s.key)).collect();
            out.push_str(&indent);
            out.push_str(&format!("{{\"keys\": [{}],\n", keys.join(",")));
            out.push_str(&indent);
            out.push_str("\"children\": [\n");
            for (i, &child) in node.children.iter().enumerate() {
                dump_node(file, codec, child, depth + 1, out)?;
                out.push_str(if i + 1 < node.children.len() { ",\n" } else { "\n" });
            }
            out.push_str(&indent);
            out.push_str("]}");
        }
    }
    Ok(())
}

/// `"k:[(p,s),...]"` for each run of equal keys.
fn leaf_keys(leaf: &LeafNode) -> String {
    let mut groups: Vec<String> = Vec::new();
    let mut entries = leaf.entries.iter().peekable();
    while let Some(first) = entries.next() {
        let mut rids = vec![first.rid.to_string()];
        while let Some(next) = entries.next_if(|e| e.key == first.key) {
            rids.push(next.rid.to_string());
        }
        groups.push(format!("\"{}:[{}]\"", first.key, rids.join(",")));
    }
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Rid;
    use crate::index::btree::node::Family;
    use crate::index::key::{IndexEntry, Key};

    #[test]
    fn test_leaf_keys_groups_duplicates() {
        let mut leaf = LeafNode::new(Family::ORPHAN);
        leaf.entries = vec![
            IndexEntry::new(Key::Int(1), Rid::new(1, 1)),
            IndexEntry::new(Key::Int(2), Rid::new(1, 2)),
            IndexEntry::new(Key::Int(2), Rid::new(4, 0)),
            IndexEntry::new(Key::Int(7), Rid::new(0, 9)),
        ];
        assert_eq!(
            leaf_keys(&leaf),
            r#""1:[(1,1)]","2:[(1,2),(4,0)]","7:[(0,9)]""#
        );
        assert_eq!(leaf_keys(&LeafNode::new(Family { parent: PageId::new(3), ..Family::ORPHAN })), "");
    }
}

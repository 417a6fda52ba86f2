//! Disk-backed B+-tree.
//!
//! # Layers
//! ```text
//!  IndexManager ──► TreeMutator ──► Navigator ──► IndexFileHandle ──► DiskManager
//!        │              │                ▲              │
//!        └─► ScanCursor ┴────────────────┘              └─► IoStats, IndexMeta
//!                           NodeCodec  (Node <-> Page)
//! ```
//!
//! Nodes never hold references to each other. Parent and sibling links are
//! page numbers, every traversal starts from the root recorded in the
//! metadata page, and each node is decoded, edited and re-encoded as a value.

mod codec;
mod dump;
mod file_handle;
mod meta;
mod mutation;
mod navigator;
mod node;
mod scan;
mod stats;
mod verify;

pub(crate) use codec::NodeCodec;
pub(crate) use dump::dump_tree;
pub use file_handle::IndexFileHandle;
pub use meta::{FORMAT_VERSION, MAGIC};
pub(crate) use mutation::{max_key_len, TreeMutator};
pub(crate) use scan::ScanBounds;
pub use scan::ScanCursor;
pub use stats::{IoStats, IoStatsSnapshot};
pub(crate) use verify::check_tree;
pub use verify::TreeShape;

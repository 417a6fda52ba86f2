//! bptree-index - A disk-backed B+-tree secondary index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          bptree-index                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              IndexManager (index/)                       │   │
//! │  │   create / open / close / destroy, insert, delete, scan  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              B+-tree (index/btree/)                      │   │
//! │  │   Mutation engine · Navigator · ScanCursor · NodeCodec   │   │
//! │  │   IndexFileHandle: root, free list, I/O counters         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │         DiskManager + Page + PageHeader                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Rid, Attribute, Error, config)
//! - [`storage`] - Paged file I/O and page formats
//! - [`index`] - Keys, the B+-tree and the index manager
//!
//! # Quick Start
//! ```no_run
//! use bptree_index::{Attribute, IndexConfig, IndexManager, Key, Rid};
//!
//! let manager = IndexManager::new(IndexConfig::default()).unwrap();
//! manager.create_file("ages.idx").unwrap();
//! let mut handle = manager.open_file("ages.idx").unwrap();
//!
//! let age = Attribute::int("age");
//! manager.insert_entry(&mut handle, &age, &Key::Int(30), Rid::new(7, 2)).unwrap();
//! println!("{}", manager.print_btree(&handle, &age).unwrap());
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
pub use common::{AttrType, Attribute, Error, IndexConfig, PageId, Result, Rid};

pub use index::btree::{IndexFileHandle, IoStats, IoStatsSnapshot, ScanCursor, TreeShape};
pub use index::{IndexEntry, IndexManager, Key};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;

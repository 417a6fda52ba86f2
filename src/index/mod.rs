//! Index layer: keys, the B+-tree and the manager callers use.

pub mod btree;
mod key;
mod manager;

pub use key::{IndexEntry, Key};
pub use manager::IndexManager;

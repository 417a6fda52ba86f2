//! Common types and utilities shared across the index engine.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexConfig`]
//! - Error types
//! - Identifiers ([`PageId`], [`Rid`]) and attribute metadata

mod attribute;
pub mod config;
pub mod error;
mod page_id;
mod rid;

pub use attribute::{AttrType, Attribute};
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use page_id::PageId;
pub use rid::Rid;

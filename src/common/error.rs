//! Error types for the index engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::common::{AttrType, PageId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the index engine.
///
/// I/O-layer failures (`CreateFailed` through `AppendFailed`) are passed up
/// unchanged and never retried. `CorruptPage` is fatal. `EntryNotFound`,
/// `DuplicateEntry` and the key validation errors leave the tree untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// The index file already exists or could not be created.
    #[error("failed to create index file {}: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The index file could not be removed.
    #[error("failed to destroy index file {}: {source}", path.display())]
    DestroyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The index file is missing, unreadable, or has a torn length.
    #[error("failed to open index file {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a page from disk failed.
    #[error("failed to read {page_id}: {source}")]
    ReadFailed {
        page_id: PageId,
        #[source]
        source: io::Error,
    },

    /// Writing a page to disk failed.
    #[error("failed to write {page_id}: {source}")]
    WriteFailed {
        page_id: PageId,
        #[source]
        source: io::Error,
    },

    /// Extending the file by one page failed.
    #[error("failed to append page: {source}")]
    AppendFailed {
        #[source]
        source: io::Error,
    },

    /// Requested page does not exist in the file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// A page failed structural validation while decoding.
    ///
    /// Indicates on-disk corruption or a format version mismatch.
    #[error("corrupt {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    /// The file was written with a different page size than requested.
    #[error("page size mismatch: expected {expected}, file uses {found}")]
    PageSizeMismatch { expected: usize, found: usize },

    /// A node does not fit in one page.
    ///
    /// Consumed by the mutation engine, which splits the node instead.
    #[error("node needs {required} bytes but a page holds {capacity}")]
    PageOverflow { required: usize, capacity: usize },

    /// No entry with exactly this key and RID exists.
    #[error("entry not found")]
    EntryNotFound,

    /// An entry with exactly this key and RID already exists.
    #[error("duplicate entry")]
    DuplicateEntry,

    /// The key's type differs from the indexed attribute's type.
    #[error("key type mismatch: attribute is {expected:?}, key is {found:?}")]
    KeyTypeMismatch { expected: AttrType, found: AttrType },

    /// The key is longer than the attribute allows or than a page can hold.
    #[error("key of {size} bytes exceeds limit of {max} bytes")]
    KeyTooLarge { size: usize, max: usize },

    /// The scan cursor was used after `close()`.
    #[error("scan cursor is closed")]
    ScanClosed,

    /// Manager settings are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for a `CorruptPage` error.
    pub(crate) fn corrupt(page_id: PageId, reason: impl Into<String>) -> Self {
        Error::CorruptPage {
            page_id,
            reason: reason.into(),
        }
    }

    /// Attach the page a decode error came from.
    ///
    /// Codecs work on bare buffers and report `PageId::INVALID`; the caller
    /// that read the page knows its number.
    pub(crate) fn at_page(self, page_id: PageId) -> Self {
        match self {
            Error::CorruptPage { reason, .. } => Error::CorruptPage { page_id, reason },
            other => other,
        }
    }
}

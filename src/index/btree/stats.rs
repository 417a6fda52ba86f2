//! Page I/O counters for an index file handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts page reads, writes and appends made through one handle.
///
/// Counters only ever grow while the handle is open and never affect tree
/// behavior. They are atomic so reads through a shared handle (scans) can
/// count without a lock.
///
/// # Memory Ordering
/// All operations use `Ordering::Relaxed`: only atomicity matters, and the
/// counters don't synchronize with each other.
///
/// # Example
/// ```
/// use bptree_index::IoStats;
///
/// let stats = IoStats::new();
/// stats.record_read();
/// stats.record_append();
/// let snapshot = stats.snapshot();
/// assert_eq!((snapshot.pages_read, snapshot.pages_appended), (1, 1));
/// ```
#[derive(Debug, Default)]
pub struct IoStats {
    pages_read: AtomicU64,
    pages_written: AtomicU64,
    pages_appended: AtomicU64,
}

impl IoStats {
    /// Create a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_read(&self) {
        self.pages_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_append(&self) {
        self.pages_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of the counters.
    pub fn snapshot(&self) -> IoStatsSnapshot {
        IoStatsSnapshot {
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_appended: self.pages_appended.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`IoStats`].
///
/// Unlike `IoStats`, this is plain data and can be compared or subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoStatsSnapshot {
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_appended: u64,
}

impl IoStatsSnapshot {
    /// Counter increase from `earlier` to `self`.
    pub fn since(&self, earlier: &IoStatsSnapshot) -> IoStatsSnapshot {
        IoStatsSnapshot {
            pages_read: self.pages_read - earlier.pages_read,
            pages_written: self.pages_written - earlier.pages_written,
            pages_appended: self.pages_appended - earlier.pages_appended,
        }
    }
}

impl fmt::Display for IoStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IoStats {{ read: {}, written: {}, appended: {} }}",
            self.pages_read, self.pages_written, self.pages_appended
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = IoStats::new();
        assert_eq!(stats.snapshot(), IoStatsSnapshot::default());
    }

    #[test]
    fn test_stats_increment() {
        let stats = IoStats::new();
        for _ in 0..3 {
            stats.record_read();
        }
        stats.record_write();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.pages_read, 3);
        assert_eq!(snapshot.pages_written, 1);
        assert_eq!(snapshot.pages_appended, 0);
    }

    #[test]
    fn test_snapshot_since() {
        let stats = IoStats::new();
        stats.record_read();
        let before = stats.snapshot();

        stats.record_read();
        stats.record_append();
        let delta = stats.snapshot().since(&before);

        assert_eq!(delta.pages_read, 1);
        assert_eq!(delta.pages_written, 0);
        assert_eq!(delta.pages_appended, 1);
    }

    #[test]
    fn test_stats_display() {
        let stats = IoStats::new();
        stats.record_write();
        stats.record_write();

        let display = format!("{}", stats.snapshot());
        assert!(display.contains("written: 2"));
        assert!(display.contains("read: 0"));
    }
}

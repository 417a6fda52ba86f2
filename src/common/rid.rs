//! Record identifier type.

use std::fmt;

/// Identifies a record in a heap file: data page number plus slot.
///
/// The index never interprets a RID. It only stores it next to the key and
/// uses it to order entries that share a key. The derived ordering compares
/// the page number first, then the slot.
///
/// # Example
/// ```
/// use bptree_index::Rid;
///
/// let a = Rid::new(1, 9);
/// let b = Rid::new(2, 0);
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rid {
    pub page_num: u32,
    pub slot_num: u32,
}

impl Rid {
    /// Smallest possible RID, used to probe for the first entry of a key.
    pub const MIN: Rid = Rid {
        page_num: 0,
        slot_num: 0,
    };

    /// Largest possible RID.
    pub const MAX: Rid = Rid {
        page_num: u32::MAX,
        slot_num: u32::MAX,
    };

    /// Encoded size on disk.
    pub const SIZE: usize = 8;

    #[inline]
    pub fn new(page_num: u32, slot_num: u32) -> Self {
        Self { page_num, slot_num }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.page_num, self.slot_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rid_ordering() {
        assert!(Rid::new(0, 5) < Rid::new(1, 0));
        assert!(Rid::new(1, 0) < Rid::new(1, 1));
        assert!(Rid::MIN <= Rid::new(0, 0));
        assert!(Rid::new(u32::MAX, 7) < Rid::MAX);
    }

    #[test]
    fn test_rid_display() {
        assert_eq!(format!("{}", Rid::new(3, 14)), "(3,14)");
    }
}

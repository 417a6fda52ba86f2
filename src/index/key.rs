//! Index keys and entries.
//!
//! A [`Key`] is one attribute value; an [`IndexEntry`] pairs it with the
//! [`Rid`] of the record it points at. Entries are totally ordered by key and
//! then by RID, which gives duplicate keys a deterministic order.
//!
//! # Key encoding
//! ```text
//! Int      i32 little-endian (4 bytes)
//! Real     f32 little-endian (4 bytes)
//! VarChar  u32 length (4 bytes) followed by `length` raw bytes
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::common::{AttrType, Attribute, Error, Result, Rid};

/// A single attribute value.
#[derive(Debug, Clone)]
pub enum Key {
    Int(i32),
    Real(f32),
    VarChar(Vec<u8>),
}

impl Key {
    /// A `VarChar` key from anything byte-like.
    pub fn varchar(bytes: impl Into<Vec<u8>>) -> Self {
        Key::VarChar(bytes.into())
    }

    /// Type tag this key belongs to.
    pub fn attr_type(&self) -> AttrType {
        match self {
            Key::Int(_) => AttrType::Int,
            Key::Real(_) => AttrType::Real,
            Key::VarChar(_) => AttrType::VarChar,
        }
    }

    /// Number of bytes the key occupies in a page.
    pub fn encoded_len(&self) -> usize {
        match self {
            Key::Int(_) | Key::Real(_) => 4,
            Key::VarChar(bytes) => 4 + bytes.len(),
        }
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Key::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Key::Real(v) => out.extend_from_slice(&v.to_le_bytes()),
            Key::VarChar(bytes) => {
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }
    }

    /// Decode a key of `attr_type` from the front of `buf`.
    ///
    /// Returns the key and the number of bytes consumed, or `None` if `buf`
    /// is too short.
    pub(crate) fn decode(attr_type: AttrType, buf: &[u8]) -> Option<(Key, usize)> {
        let word: [u8; 4] = buf.get(..4)?.try_into().ok()?;
        match attr_type {
            AttrType::Int => Some((Key::Int(i32::from_le_bytes(word)), 4)),
            AttrType::Real => Some((Key::Real(f32::from_le_bytes(word)), 4)),
            AttrType::VarChar => {
                let len = u32::from_le_bytes(word) as usize;
                let bytes = buf.get(4..4usize.checked_add(len)?)?;
                Some((Key::VarChar(bytes.to_vec()), 4 + len))
            }
        }
    }

    /// Check that this key can be stored in an index over `attr`.
    ///
    /// `max_encoded` is the largest encoded key a page of the index can take.
    pub(crate) fn validate(&self, attr: &Attribute, max_encoded: usize) -> Result<()> {
        if self.attr_type() != attr.attr_type {
            return Err(Error::KeyTypeMismatch {
                expected: attr.attr_type,
                found: self.attr_type(),
            });
        }
        if let Key::VarChar(bytes) = self {
            if bytes.len() > attr.length as usize {
                return Err(Error::KeyTooLarge {
                    size: bytes.len(),
                    max: attr.length as usize,
                });
            }
        }
        if self.encoded_len() > max_encoded {
            return Err(Error::KeyTooLarge {
                size: self.encoded_len(),
                max: max_encoded,
            });
        }
        Ok(())
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            // By value; NaNs fall back to the IEEE total order so the
            // comparison stays total.
            (Key::Real(a), Key::Real(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (Key::VarChar(a), Key::VarChar(b)) => a.as_slice().cmp(b.as_slice()),
            _ => (self.attr_type() as u8).cmp(&(other.attr_type() as u8)),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v)
    }
}

impl From<f32> for Key {
    fn from(v: f32) -> Self {
        Key::Real(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::VarChar(v.as_bytes().to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Real(v) => write!(f, "{v}"),
            Key::VarChar(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// A `(key, rid)` pair as stored in a leaf, and as used for separators in
/// interior nodes.
///
/// The derived ordering compares the key first and the RID second.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub key: Key,
    pub rid: Rid,
}

impl IndexEntry {
    pub fn new(key: Key, rid: Rid) -> Self {
        Self { key, rid }
    }

    /// Bytes occupied in a page: the key plus the RID.
    pub fn encoded_len(&self) -> usize {
        self.key.encoded_len() + Rid::SIZE
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        self.key.encode_into(out);
        out.extend_from_slice(&self.rid.page_num.to_le_bytes());
        out.extend_from_slice(&self.rid.slot_num.to_le_bytes());
    }

    pub(crate) fn decode(attr_type: AttrType, buf: &[u8]) -> Option<(IndexEntry, usize)> {
        let (key, used) = Key::decode(attr_type, buf)?;
        let rid_bytes = buf.get(used..used + Rid::SIZE)?;
        let page_num = u32::from_le_bytes(rid_bytes[..4].try_into().ok()?);
        let slot_num = u32::from_le_bytes(rid_bytes[4..].try_into().ok()?);
        Some((IndexEntry::new(key, Rid::new(page_num, slot_num)), used + Rid::SIZE))
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.rid)
    }
}

//! Attribute metadata for the indexed column.

use std::fmt;

/// Type tag of an indexed attribute.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    /// 32-bit signed integer.
    Int = 0,
    /// 32-bit IEEE float.
    Real = 1,
    /// Variable-length byte string, stored with a 4-byte length prefix.
    VarChar = 2,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Int => "INT",
            AttrType::Real => "REAL",
            AttrType::VarChar => "VARCHAR",
        };
        f.write_str(name)
    }
}

/// Describes the column an index is built over.
///
/// `length` is the declared maximum byte length for `VarChar` and 4 for the
/// fixed-width types. Callers hand in attributes that are already validated
/// against their schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttrType,
    pub length: u32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attr_type: AttrType, length: u32) -> Self {
        Self {
            name: name.into(),
            attr_type,
            length,
        }
    }

    /// An `INT` attribute.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Int, 4)
    }

    /// A `REAL` attribute.
    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, AttrType::Real, 4)
    }

    /// A `VARCHAR(length)` attribute.
    pub fn varchar(name: impl Into<String>, length: u32) -> Self {
        Self::new(name, AttrType::VarChar, length)
    }
}

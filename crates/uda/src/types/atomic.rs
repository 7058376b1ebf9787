// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Atomic type table: names, wire tags, sizes and alignment.

use serde::Deserialize;
use std::fmt;

/// Atomic (and compound marker) data types.
///
/// The discriminant order is the wire tag and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Unknown,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    /// Variable-length text, length-prefixed on the wire.
    String,
    /// A registered compound type.
    Compound,
}

const ALL: [DataType; 15] = [
    DataType::Unknown,
    DataType::Char,
    DataType::UChar,
    DataType::Short,
    DataType::UShort,
    DataType::Int,
    DataType::UInt,
    DataType::Long,
    DataType::ULong,
    DataType::LongLong,
    DataType::ULongLong,
    DataType::Float,
    DataType::Double,
    DataType::String,
    DataType::Compound,
];

impl DataType {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`DataType::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        ALL.get(usize::from(tag)).copied()
    }

    /// Resolve an atomic type name, including fixed-width aliases.
    ///
    /// Returns `None` for compound or unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let dt = match name.trim() {
            "char" | "int8" | "int8_t" => Self::Char,
            "unsigned char" | "uint8" | "uint8_t" => Self::UChar,
            "short" | "int16" | "int16_t" => Self::Short,
            "unsigned short" | "uint16" | "uint16_t" => Self::UShort,
            "int" | "int32" | "int32_t" => Self::Int,
            "unsigned int" | "uint32" | "uint32_t" => Self::UInt,
            "long" => Self::Long,
            "unsigned long" => Self::ULong,
            "long long" | "int64" | "int64_t" => Self::LongLong,
            "unsigned long long" | "uint64" | "uint64_t" => Self::ULongLong,
            "float" | "float32" => Self::Float,
            "double" | "float64" => Self::Double,
            "STRING" | "string" => Self::String,
            _ => return None,
        };
        Some(dt)
    }

    /// Canonical name, as written into type tables.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Char => "char",
            Self::UChar => "unsigned char",
            Self::Short => "short",
            Self::UShort => "unsigned short",
            Self::Int => "int",
            Self::UInt => "unsigned int",
            Self::Long => "long",
            Self::ULong => "unsigned long",
            Self::LongLong => "long long",
            Self::ULongLong => "unsigned long long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "STRING",
            Self::Compound => "compound",
        }
    }

    /// In-memory element size used for layout. `None` for compound/unknown.
    pub fn size(self, pointer_width: PointerWidth) -> Option<usize> {
        match self {
            Self::Char | Self::UChar => Some(1),
            Self::Short | Self::UShort => Some(2),
            Self::Int | Self::UInt | Self::Float => Some(4),
            Self::Long | Self::ULong | Self::LongLong | Self::ULongLong | Self::Double => Some(8),
            Self::String => Some(pointer_width.bytes()),
            Self::Unknown | Self::Compound => None,
        }
    }

    /// Layout alignment. Atomic types align to their own size.
    pub fn alignment(self, pointer_width: PointerWidth) -> Option<usize> {
        self.size(pointer_width)
    }

    /// Fixed wire width of one element. `None` for strings and compounds.
    pub fn wire_size(self) -> Option<usize> {
        match self {
            Self::String => None,
            other => other.size(PointerWidth::Eight),
        }
    }

    pub fn is_atomic(self) -> bool {
        !matches!(self, Self::Unknown | Self::Compound)
    }

    pub fn is_numeric(self) -> bool {
        self.is_atomic() && self != Self::String
    }

    pub fn is_integer(self) -> bool {
        self.is_numeric() && !matches!(self, Self::Float | Self::Double)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pointer width assumed when computing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum PointerWidth {
    Four,
    Eight,
}

impl PointerWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Pointer width of the running process.
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "32") {
            Self::Four
        } else {
            Self::Eight
        }
    }
}

impl Default for PointerWidth {
    fn default() -> Self {
        Self::host()
    }
}

impl TryFrom<u8> for PointerWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(format!("unsupported pointer width {}", other)),
        }
    }
}

impl fmt::Display for PointerWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for dt in ALL {
            assert_eq!(DataType::from_tag(dt.tag()), Some(dt));
        }
        assert_eq!(DataType::from_tag(15), None);
    }

    #[test]
    fn test_alias_names() {
        assert_eq!(DataType::from_name("int32_t"), Some(DataType::Int));
        assert_eq!(DataType::from_name("uint8"), Some(DataType::UChar));
        assert_eq!(DataType::from_name("float64"), Some(DataType::Double));
        assert_eq!(DataType::from_name("STRING"), Some(DataType::String));
        assert_eq!(DataType::from_name("EFIT"), None);
    }

    #[test]
    fn test_sizes_follow_pointer_width_only_for_strings() {
        assert_eq!(DataType::Double.size(PointerWidth::Four), Some(8));
        assert_eq!(DataType::String.size(PointerWidth::Four), Some(4));
        assert_eq!(DataType::String.size(PointerWidth::Eight), Some(8));
        assert_eq!(DataType::Compound.size(PointerWidth::Eight), None);
        assert_eq!(DataType::String.wire_size(), None);
        assert_eq!(DataType::Short.wire_size(), Some(2));
    }

    #[test]
    fn test_pointer_width_conversion() {
        assert_eq!(PointerWidth::try_from(4), Ok(PointerWidth::Four));
        assert!(PointerWidth::try_from(2).is_err());
    }
}

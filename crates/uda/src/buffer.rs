// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed primitive buffers.
//!
//! Owned storage for Data Block arrays (data, errors, explicit dims) and for
//! primitive arrays on the wire.

use crate::instance::Value;
use crate::types::DataType;

/// A homogeneous array of one atomic type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Char(Vec<i8>),
    UChar(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Long(Vec<i64>),
    ULong(Vec<u64>),
    LongLong(Vec<i64>),
    ULongLong(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

/// Apply `$body` to the inner vector, whatever the variant.
macro_rules! with_inner {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            TypedBuffer::Char($v) => $body,
            TypedBuffer::UChar($v) => $body,
            TypedBuffer::Short($v) => $body,
            TypedBuffer::UShort($v) => $body,
            TypedBuffer::Int($v) => $body,
            TypedBuffer::UInt($v) => $body,
            TypedBuffer::Long($v) => $body,
            TypedBuffer::ULong($v) => $body,
            TypedBuffer::LongLong($v) => $body,
            TypedBuffer::ULongLong($v) => $body,
            TypedBuffer::Float($v) => $body,
            TypedBuffer::Double($v) => $body,
            TypedBuffer::String($v) => $body,
        }
    };
}

/// Build a buffer of the same variant from `$body`.
macro_rules! map_inner {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            TypedBuffer::Char($v) => TypedBuffer::Char($body),
            TypedBuffer::UChar($v) => TypedBuffer::UChar($body),
            TypedBuffer::Short($v) => TypedBuffer::Short($body),
            TypedBuffer::UShort($v) => TypedBuffer::UShort($body),
            TypedBuffer::Int($v) => TypedBuffer::Int($body),
            TypedBuffer::UInt($v) => TypedBuffer::UInt($body),
            TypedBuffer::Long($v) => TypedBuffer::Long($body),
            TypedBuffer::ULong($v) => TypedBuffer::ULong($body),
            TypedBuffer::LongLong($v) => TypedBuffer::LongLong($body),
            TypedBuffer::ULongLong($v) => TypedBuffer::ULongLong($body),
            TypedBuffer::Float($v) => TypedBuffer::Float($body),
            TypedBuffer::Double($v) => TypedBuffer::Double($body),
            TypedBuffer::String($v) => TypedBuffer::String($body),
        }
    };
}

impl TypedBuffer {
    /// Empty buffer of an atomic type.
    pub fn empty(data_type: DataType) -> Option<Self> {
        Self::from_f64(data_type, &[]).or(match data_type {
            DataType::String => Some(Self::String(Vec::new())),
            _ => None,
        })
    }

    /// `count` zeros (empty strings for `String`).
    pub fn zeros(data_type: DataType, count: usize) -> Option<Self> {
        match data_type {
            DataType::String => Some(Self::String(vec![String::new(); count])),
            other => Self::from_f64(other, &vec![0.0; count]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Char(_) => DataType::Char,
            Self::UChar(_) => DataType::UChar,
            Self::Short(_) => DataType::Short,
            Self::UShort(_) => DataType::UShort,
            Self::Int(_) => DataType::Int,
            Self::UInt(_) => DataType::UInt,
            Self::Long(_) => DataType::Long,
            Self::ULong(_) => DataType::ULong,
            Self::LongLong(_) => DataType::LongLong,
            Self::ULongLong(_) => DataType::ULongLong,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        with_inner!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f64`. `None` for strings.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        let out = match self {
            Self::Char(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::UChar(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Short(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::UShort(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::UInt(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Long(v) | Self::LongLong(v) => v.iter().map(|&x| x as f64).collect(),
            Self::ULong(v) | Self::ULongLong(v) => v.iter().map(|&x| x as f64).collect(),
            Self::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Double(v) => v.clone(),
            Self::String(_) => return None,
        };
        Some(out)
    }

    /// One value widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Self::Char(v) => v.get(index).map(|&x| f64::from(x)),
            Self::UChar(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Short(v) => v.get(index).map(|&x| f64::from(x)),
            Self::UShort(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Int(v) => v.get(index).map(|&x| f64::from(x)),
            Self::UInt(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Long(v) | Self::LongLong(v) => v.get(index).map(|&x| x as f64),
            Self::ULong(v) | Self::ULongLong(v) => v.get(index).map(|&x| x as f64),
            Self::Float(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Double(v) => v.get(index).copied(),
            Self::String(_) => None,
        }
    }

    /// Narrow `f64` values into a buffer of `data_type` (saturating casts).
    pub fn from_f64(data_type: DataType, values: &[f64]) -> Option<Self> {
        let buf = match data_type {
            DataType::Char => Self::Char(values.iter().map(|&x| x as i8).collect()),
            DataType::UChar => Self::UChar(values.iter().map(|&x| x as u8).collect()),
            DataType::Short => Self::Short(values.iter().map(|&x| x as i16).collect()),
            DataType::UShort => Self::UShort(values.iter().map(|&x| x as u16).collect()),
            DataType::Int => Self::Int(values.iter().map(|&x| x as i32).collect()),
            DataType::UInt => Self::UInt(values.iter().map(|&x| x as u32).collect()),
            DataType::Long => Self::Long(values.iter().map(|&x| x as i64).collect()),
            DataType::ULong => Self::ULong(values.iter().map(|&x| x as u64).collect()),
            DataType::LongLong => Self::LongLong(values.iter().map(|&x| x as i64).collect()),
            DataType::ULongLong => Self::ULongLong(values.iter().map(|&x| x as u64).collect()),
            DataType::Float => Self::Float(values.iter().map(|&x| x as f32).collect()),
            DataType::Double => Self::Double(values.to_vec()),
            DataType::String | DataType::Unknown | DataType::Compound => return None,
        };
        Some(buf)
    }

    /// Gather elements at `indices` (out-of-range indices are skipped).
    pub fn select(&self, indices: &[usize]) -> Self {
        map_inner!(self, v => indices.iter().filter_map(|&i| v.get(i).cloned()).collect())
    }

    /// First `len` elements.
    pub fn truncated(&self, len: usize) -> Self {
        map_inner!(self, v => v.iter().take(len).cloned().collect())
    }

    /// Collect atomic values of one type. `None` on a type mismatch.
    pub fn from_values(data_type: DataType, values: &[Value]) -> Option<Self> {
        macro_rules! collect {
            ($variant:ident) => {
                values
                    .iter()
                    .map(|v| match v {
                        Value::$variant(x) => Some(x.clone()),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(Self::$variant)
            };
        }
        match data_type {
            DataType::Char => collect!(Char),
            DataType::UChar => collect!(UChar),
            DataType::Short => collect!(Short),
            DataType::UShort => collect!(UShort),
            DataType::Int => collect!(Int),
            DataType::UInt => collect!(UInt),
            DataType::Long => collect!(Long),
            DataType::ULong => collect!(ULong),
            DataType::LongLong => collect!(LongLong),
            DataType::ULongLong => collect!(ULongLong),
            DataType::Float => collect!(Float),
            DataType::Double => collect!(Double),
            DataType::String => values
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::String),
            DataType::Unknown | DataType::Compound => None,
        }
    }
}

impl From<Vec<f64>> for TypedBuffer {
    fn from(v: Vec<f64>) -> Self {
        Self::Double(v)
    }
}

impl From<Vec<f32>> for TypedBuffer {
    fn from(v: Vec<f32>) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<i32>> for TypedBuffer {
    fn from(v: Vec<i32>) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<String>> for TypedBuffer {
    fn from(v: Vec<String>) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_and_narrow() {
        let buf = TypedBuffer::Short(vec![1, -2, 3]);
        assert_eq!(buf.to_f64(), Some(vec![1.0, -2.0, 3.0]));
        assert_eq!(buf.get_f64(1), Some(-2.0));
        let narrowed = TypedBuffer::from_f64(DataType::Int, &[1.9, -1.2]).unwrap();
        assert_eq!(narrowed, TypedBuffer::Int(vec![1, -1]));
        assert!(TypedBuffer::String(vec![]).to_f64().is_none());
    }

    #[test]
    fn test_select_and_truncate() {
        let buf = TypedBuffer::Double(vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(buf.select(&[3, 1, 9]), TypedBuffer::Double(vec![3.0, 1.0]));
        assert_eq!(buf.truncated(2).len(), 2);
    }

    #[test]
    fn test_from_values() {
        let values = vec![Value::Int(1), Value::Int(2)];
        assert_eq!(
            TypedBuffer::from_values(DataType::Int, &values),
            Some(TypedBuffer::Int(vec![1, 2]))
        );
        assert!(TypedBuffer::from_values(DataType::Float, &values).is_none());
    }

    #[test]
    fn test_zeros_and_empty() {
        assert_eq!(TypedBuffer::zeros(DataType::UChar, 2), Some(TypedBuffer::UChar(vec![0, 0])));
        assert_eq!(TypedBuffer::empty(DataType::String), Some(TypedBuffer::String(vec![])));
        assert!(TypedBuffer::empty(DataType::Compound).is_none());
    }
}

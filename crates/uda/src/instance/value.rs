// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field values of a structure instance.

use crate::ledger::NodeId;
use crate::types::{DataType, FieldDescriptor, TypeDescriptor, TypeRegistry};
use std::collections::HashMap;

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    Str(String),
    /// Fixed-shape array field, flattened (first shape index varies slowest).
    Array(Vec<Value>),
    /// Compound value keyed by field name.
    Struct(HashMap<String, Value>),
    /// Pointer field: arena block, or null.
    Pointer(Option<NodeId>),
}

impl Value {
    /// Zero value of an atomic type.
    pub fn zero(data_type: DataType) -> Option<Self> {
        let v = match data_type {
            DataType::Char => Self::Char(0),
            DataType::UChar => Self::UChar(0),
            DataType::Short => Self::Short(0),
            DataType::UShort => Self::UShort(0),
            DataType::Int => Self::Int(0),
            DataType::UInt => Self::UInt(0),
            DataType::Long => Self::Long(0),
            DataType::ULong => Self::ULong(0),
            DataType::LongLong => Self::LongLong(0),
            DataType::ULongLong => Self::ULongLong(0),
            DataType::Float => Self::Float(0.0),
            DataType::Double => Self::Double(0.0),
            DataType::String => Self::Str(String::new()),
            DataType::Unknown | DataType::Compound => return None,
        };
        Some(v)
    }

    /// Atomic type of this value, `Compound` for structs, `Unknown` otherwise.
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
            Self::Str(_) => DataType::String,
            Self::Struct(_) => DataType::Compound,
            Self::Array(_) | Self::Pointer(_) => DataType::Unknown,
        }
    }

    /// Numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Char(v) => Some(f64::from(v)),
            Self::UChar(v) => Some(f64::from(v)),
            Self::Short(v) => Some(f64::from(v)),
            Self::UShort(v) => Some(f64::from(v)),
            Self::Int(v) => Some(f64::from(v)),
            Self::UInt(v) => Some(f64::from(v)),
            Self::Long(v) | Self::LongLong(v) => Some(v as f64),
            Self::ULong(v) | Self::ULongLong(v) => Some(v as f64),
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Self::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut HashMap<String, Value>> {
        match self {
            Self::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<Option<NodeId>> {
        match self {
            Self::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Char(v) => Some(v.into()),
            Self::UChar(v) => Some(v.into()),
            Self::Short(v) => Some(v.into()),
            Self::UShort(v) => Some(v.into()),
            Self::Int(v) => Some(v.into()),
            Self::UInt(v) => Some(v.into()),
            Self::Long(v) | Self::LongLong(v) => Some(v.into()),
            Self::ULong(v) | Self::ULongLong(v) => Some(v.into()),
            _ => None,
        }
    }

    /// This value as atomic `data_type`, when the conversion is exact.
    ///
    /// Integers convert between widths and signedness while the value fits;
    /// `float` widens to `double`, and `double` narrows only when no bits are
    /// lost.
    #[allow(clippy::cast_possible_truncation)]
    pub fn convert_to(&self, data_type: DataType) -> Option<Self> {
        if self.data_type() == data_type {
            return Some(self.clone());
        }
        if data_type.is_integer() {
            let v = self.as_i128()?;
            let converted = match data_type {
                DataType::Char => Self::Char(i8::try_from(v).ok()?),
                DataType::UChar => Self::UChar(u8::try_from(v).ok()?),
                DataType::Short => Self::Short(i16::try_from(v).ok()?),
                DataType::UShort => Self::UShort(u16::try_from(v).ok()?),
                DataType::Int => Self::Int(i32::try_from(v).ok()?),
                DataType::UInt => Self::UInt(u32::try_from(v).ok()?),
                DataType::Long => Self::Long(i64::try_from(v).ok()?),
                DataType::ULong => Self::ULong(u64::try_from(v).ok()?),
                DataType::LongLong => Self::LongLong(i64::try_from(v).ok()?),
                DataType::ULongLong => Self::ULongLong(u64::try_from(v).ok()?),
                _ => return None,
            };
            return Some(converted);
        }
        match (data_type, self) {
            (DataType::Double, Self::Float(v)) => Some(Self::Double(f64::from(*v))),
            (DataType::Float, Self::Double(v)) => {
                let narrow = *v as f32;
                (f64::from(narrow).to_bits() == v.to_bits() || v.is_nan())
                    .then_some(Self::Float(narrow))
            }
            _ => None,
        }
    }

    /// This value shaped like `slot`, the current value of a field.
    ///
    /// Atomics are converted to the slot's type, array elements to the type
    /// of the slot's elements; structs and pointers must already match.
    pub fn conform(self, slot: &Value) -> Option<Self> {
        match (slot, self) {
            (Self::Array(current), Self::Array(items)) => match current.first() {
                Some(template) => items
                    .into_iter()
                    .map(|item| item.conform(template))
                    .collect::<Option<Vec<_>>>()
                    .map(Self::Array),
                None => Some(Self::Array(items)),
            },
            (Self::Struct(_), value @ Self::Struct(_)) => Some(value),
            (Self::Pointer(_), value @ Self::Pointer(_)) => Some(value),
            (Self::Array(_) | Self::Struct(_) | Self::Pointer(_), _) => None,
            (current, value) => value.convert_to(current.data_type()),
        }
    }

    /// Short variant name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Pointer(_) => "pointer",
            other => other.data_type().name(),
        }
    }

    /// Default value of a compound type: zeros, empty strings, null pointers.
    pub fn default_struct(registry: &TypeRegistry, desc: &TypeDescriptor) -> Self {
        let fields = desc
            .fields
            .iter()
            .map(|f| (f.name.clone(), Self::default_field(registry, f)))
            .collect();
        Self::Struct(fields)
    }

    /// Default value of one field.
    pub fn default_field(registry: &TypeRegistry, field: &FieldDescriptor) -> Self {
        if field.is_pointer {
            return Self::Pointer(None);
        }
        let element = Self::default_element(registry, field);
        if field.is_scalar() {
            element
        } else {
            Self::Array(vec![element; field.element_count])
        }
    }

    /// Default value of one element of a field's type.
    pub fn default_element(registry: &TypeRegistry, field: &FieldDescriptor) -> Self {
        if field.is_compound() {
            // Non-pointer compound fields are acyclic (enforced at registration).
            match registry.descriptor_by_name(&field.type_name) {
                Some(sub) => Self::default_struct(registry, &sub),
                None => Self::Struct(HashMap::new()),
            }
        } else {
            Self::zero(field.data_type).unwrap_or(Self::Pointer(None))
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => Char,
    u8 => UChar,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => LongLong,
    u64 => ULongLong,
    f32 => Float,
    f64 => Double,
    String => Str,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

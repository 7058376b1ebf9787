// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compound type descriptors.

use crate::types::DataType;
use std::fmt;

/// Registry handle for a compound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved, laid-out field of a compound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Canonical atomic name or compound type name (aliases already substituted).
    pub type_name: String,
    /// Atomic kind, or [`DataType::Compound`].
    pub data_type: DataType,
    pub is_pointer: bool,
    /// Fixed array shape. Empty for scalars and pointers.
    pub shape: Vec<usize>,
    /// Product of `shape`, at least 1.
    pub element_count: usize,
    /// Size of one element in memory (pointer width for pointers).
    pub element_size: usize,
    pub byte_offset: usize,
    pub padding_before: usize,
    pub alignment: usize,
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Bytes occupied by the field itself, excluding leading padding.
    pub fn byte_len(&self) -> usize {
        self.element_size * self.element_count
    }

    /// Offset one past the field's last byte.
    pub fn end(&self) -> usize {
        self.byte_offset + self.byte_len()
    }

    pub fn is_compound(&self) -> bool {
        self.data_type == DataType::Compound
    }

    pub fn is_string(&self) -> bool {
        self.data_type == DataType::String
    }

    /// Scalar non-pointer field (one element, no shape).
    pub fn is_scalar(&self) -> bool {
        !self.is_pointer && self.shape.is_empty()
    }

    /// The unresolved form of this field.
    pub fn spec(&self) -> FieldSpec {
        FieldSpec {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            pointer: self.is_pointer,
            shape: self.shape.clone(),
            description: self.description.clone(),
        }
    }
}

/// A registered compound type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    /// Alignment-padded size.
    pub byte_size: usize,
    /// Largest field alignment (1 for an empty type).
    pub alignment: usize,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Names of compound types referenced by fields (pointed-to or embedded).
    pub fn compound_dependencies(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_compound())
            .map(|f| f.type_name.as_str())
    }

    /// The unresolved definition this descriptor was built from.
    pub fn definition(&self) -> TypeDefinition {
        TypeDefinition {
            name: self.name.clone(),
            fields: self.fields.iter().map(FieldDescriptor::spec).collect(),
        }
    }
}

/// Unresolved field, as declared by a schema or by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub type_name: String,
    pub pointer: bool,
    pub shape: Vec<usize>,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            pointer: false,
            shape: Vec::new(),
            description: None,
        }
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    pub fn shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = shape.into();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Unresolved compound type: input to [`crate::types::TypeRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

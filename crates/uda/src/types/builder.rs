// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for TypeDefinition.

use crate::types::{DataType, FieldSpec, TypeDefinition};

/// Builder for hand-registered compound types.
///
/// ```rust
/// use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};
///
/// let registry = TypeRegistry::new(PointerWidth::Eight);
/// let id = registry
///     .register(
///         TypeDefinitionBuilder::new("Coil")
///             .string_field("name")
///             .field("turns", DataType::Int)
///             .array_field("position", DataType::Double, [3])
///             .build(),
///     )
///     .unwrap();
/// assert_eq!(registry.resolve(id).unwrap().byte_size, 40);
/// ```
#[derive(Debug)]
pub struct TypeDefinitionBuilder {
    name: String,
    fields: Vec<FieldSpec>,
}

impl TypeDefinitionBuilder {
    /// Create a new builder for a compound type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add an atomic scalar field.
    pub fn field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.push(FieldSpec::new(name, data_type.name()));
        self
    }

    /// Add a fixed-shape atomic array field.
    pub fn array_field(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        shape: impl Into<Vec<usize>>,
    ) -> Self {
        self.fields
            .push(FieldSpec::new(name, data_type.name()).shape(shape));
        self
    }

    /// Add a pointer to a variable number of atomic elements.
    pub fn pointer_field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields
            .push(FieldSpec::new(name, data_type.name()).pointer());
        self
    }

    /// Add a string field.
    pub fn string_field(self, name: impl Into<String>) -> Self {
        self.field(name, DataType::String)
    }

    /// Embed another compound type by value.
    pub fn struct_field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec::new(name, type_name));
        self
    }

    /// Point to a variable number of compound elements.
    pub fn struct_pointer_field(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec::new(name, type_name).pointer());
        self
    }

    /// Add a fully specified field.
    pub fn field_spec(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Build the definition.
    pub fn build(self) -> TypeDefinition {
        TypeDefinition::new(self.name, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fields_in_order() {
        let def = TypeDefinitionBuilder::new("Sensor")
            .field("id", DataType::Int)
            .pointer_field("samples", DataType::Float)
            .struct_field("origin", "Point")
            .build();
        assert_eq!(def.name, "Sensor");
        let names: Vec<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "samples", "origin"]);
        assert!(def.fields[1].pointer);
        assert_eq!(def.fields[0].type_name, "int");
    }
}

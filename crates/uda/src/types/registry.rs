// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide registry of compound types.
//!
//! Append-only: registration takes the write lock (single writer), lookups
//! share the read lock and hand out `Arc`s so readers never hold the lock
//! while walking a descriptor.

use crate::config::MAX_TYPE_TABLE;
use crate::types::layout::{self, Member};
use crate::types::{
    DataType, FieldDescriptor, FieldSpec, PointerWidth, TypeDefinition, TypeDescriptor, TypeId,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Registration failures. Always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("type name must not be empty")]
    EmptyName,

    #[error("'{name}' is reserved for an atomic type")]
    ReservedName { name: String },

    #[error("field '{field}' of '{type_name}' references unresolved type '{target}'")]
    Unresolved {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("unresolved type name '{name}'")]
    UnknownName { name: String },

    #[error("conflicting redefinition of '{name}'")]
    Conflict { name: String },

    #[error("field '{field}' embeds '{type_name}' in itself without a pointer")]
    RecursiveField { type_name: String, field: String },

    #[error("alias cycle through '{name}'")]
    AliasCycle { name: String },

    #[error("duplicate field '{field}' in '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("field '{field}' of '{type_name}' has an invalid shape")]
    InvalidShape { type_name: String, field: String },

    #[error("type table full ({limit} entries)")]
    TableFull { limit: usize },
}

/// A type name after alias/enum substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Atomic(DataType),
    Compound(TypeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alias {
    target: String,
    pointer: bool,
}

#[derive(Debug, Default)]
struct RegistryInner {
    types: Vec<Arc<TypeDescriptor>>,
    by_name: HashMap<String, TypeId>,
    aliases: HashMap<String, Alias>,
    enums: HashMap<String, Vec<String>>,
}

impl RegistryInner {
    /// Substitute aliases and enums until a concrete name remains.
    ///
    /// Returns the concrete name and whether any alias added pointer-ness.
    fn substitute(&self, name: &str) -> Result<(String, bool), RegistrationError> {
        let mut current = name.trim().to_string();
        let mut pointer = false;
        let mut seen = HashSet::new();

        loop {
            if let Some(dt) = DataType::from_name(&current) {
                return Ok((dt.name().to_string(), pointer));
            }
            if self.by_name.contains_key(&current) {
                return Ok((current, pointer));
            }
            if self.enums.contains_key(&current) {
                return Ok((DataType::UInt.name().to_string(), pointer));
            }
            let Some(alias) = self.aliases.get(&current) else {
                return Err(RegistrationError::UnknownName { name: current });
            };
            if !seen.insert(current.clone()) {
                return Err(RegistrationError::AliasCycle { name: current });
            }
            pointer |= alias.pointer;
            current = alias.target.clone();
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
            || self.aliases.contains_key(name)
            || self.enums.contains_key(name)
    }
}

/// Registry of compound type descriptors.
#[derive(Debug)]
pub struct TypeRegistry {
    pointer_width: PointerWidth,
    inner: RwLock<RegistryInner>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(PointerWidth::host())
    }
}

impl TypeRegistry {
    pub fn new(pointer_width: PointerWidth) -> Self {
        Self {
            pointer_width,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Process-wide registry laid out for the host pointer width.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::default)
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a compound type, computing offsets, padding and size.
    ///
    /// Re-registering an identical definition returns the existing id.
    pub fn register(&self, definition: TypeDefinition) -> Result<TypeId, RegistrationError> {
        let mut inner = self.inner.write();
        let name = definition.name.trim().to_string();

        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if DataType::from_name(&name).is_some() {
            return Err(RegistrationError::ReservedName { name });
        }
        if inner.aliases.contains_key(&name) || inner.enums.contains_key(&name) {
            return Err(RegistrationError::Conflict { name });
        }

        let descriptor = self.build(&inner, &name, &definition.fields)?;

        if let Some(&existing) = inner.by_name.get(&name) {
            if *inner.types[existing.index()] == descriptor {
                log::debug!("[registry] '{}' already registered as {}", name, existing);
                return Ok(existing);
            }
            return Err(RegistrationError::Conflict { name });
        }

        if inner.types.len() >= MAX_TYPE_TABLE {
            return Err(RegistrationError::TableFull {
                limit: MAX_TYPE_TABLE,
            });
        }

        let id = TypeId(inner.types.len() as u32);
        log::debug!(
            "[registry] registered '{}' as {} ({} fields, {} bytes)",
            name,
            id,
            descriptor.fields.len(),
            descriptor.byte_size
        );
        inner.types.push(Arc::new(descriptor));
        inner.by_name.insert(name, id);
        Ok(id)
    }

    fn build(
        &self,
        inner: &RegistryInner,
        name: &str,
        specs: &[FieldSpec],
    ) -> Result<TypeDescriptor, RegistrationError> {
        let pw = self.pointer_width;
        let mut fields = Vec::with_capacity(specs.len());
        let mut seen = HashSet::new();

        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistrationError::DuplicateField {
                    type_name: name.to_string(),
                    field: spec.name.clone(),
                });
            }
            if spec.shape.contains(&0) || (spec.pointer && !spec.shape.is_empty()) {
                return Err(RegistrationError::InvalidShape {
                    type_name: name.to_string(),
                    field: spec.name.clone(),
                });
            }

            let target = spec.type_name.trim();
            let (resolved, alias_pointer) = if target == name {
                (name.to_string(), false)
            } else {
                inner.substitute(target).map_err(|e| match e {
                    RegistrationError::UnknownName { name: target } => {
                        RegistrationError::Unresolved {
                            type_name: name.to_string(),
                            field: spec.name.clone(),
                            target,
                        }
                    }
                    other => other,
                })?
            };
            let is_pointer = spec.pointer || alias_pointer;
            let shape = if is_pointer { Vec::new() } else { spec.shape.clone() };

            let (data_type, size, alignment) = if resolved == name {
                if !is_pointer {
                    return Err(RegistrationError::RecursiveField {
                        type_name: name.to_string(),
                        field: spec.name.clone(),
                    });
                }
                (DataType::Compound, pw.bytes(), pw.bytes())
            } else if let Some(dt) = DataType::from_name(&resolved) {
                let size = dt.size(pw).unwrap_or(1);
                (dt, size, size)
            } else {
                let sub = inner
                    .by_name
                    .get(&resolved)
                    .map(|id| &inner.types[id.index()])
                    .ok_or_else(|| RegistrationError::Unresolved {
                        type_name: name.to_string(),
                        field: spec.name.clone(),
                        target: resolved.clone(),
                    })?;
                (DataType::Compound, sub.byte_size, sub.alignment)
            };

            let (element_size, alignment) = if is_pointer {
                (pw.bytes(), pw.bytes())
            } else {
                (size, alignment)
            };

            fields.push(FieldDescriptor {
                name: spec.name.clone(),
                type_name: resolved,
                data_type,
                is_pointer,
                element_count: shape.iter().product::<usize>().max(1),
                shape,
                element_size,
                byte_offset: 0,
                padding_before: 0,
                alignment,
                description: spec.description.clone(),
            });
        }

        let members: Vec<Member> = fields
            .iter()
            .map(|f| Member {
                size: f.element_size,
                count: f.element_count,
                alignment: f.alignment,
            })
            .collect();
        let computed = layout::compute(&members);
        for (field, placement) in fields.iter_mut().zip(&computed.placements) {
            field.byte_offset = placement.offset;
            field.padding_before = placement.padding;
        }

        Ok(TypeDescriptor {
            name: name.to_string(),
            byte_size: computed.byte_size,
            alignment: computed.alignment,
            fields,
        })
    }

    /// Register a typedef-style alias. `pointer` adds one level of indirection.
    pub fn register_alias(
        &self,
        name: impl Into<String>,
        target: impl Into<String>,
        pointer: bool,
    ) -> Result<(), RegistrationError> {
        let name = name.into().trim().to_string();
        let alias = Alias {
            target: target.into().trim().to_string(),
            pointer,
        };
        let mut inner = self.inner.write();

        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if DataType::from_name(&name).is_some() {
            return Err(RegistrationError::ReservedName { name });
        }
        if let Some(existing) = inner.aliases.get(&name) {
            if *existing == alias {
                return Ok(());
            }
            return Err(RegistrationError::Conflict { name });
        }
        if inner.is_taken(&name) {
            return Err(RegistrationError::Conflict { name });
        }

        inner.aliases.insert(name.clone(), alias);
        // Targets may be declared later; only reject chains that loop back.
        if let Err(RegistrationError::AliasCycle { .. }) = inner.substitute(&name) {
            inner.aliases.remove(&name);
            return Err(RegistrationError::AliasCycle { name });
        }
        Ok(())
    }

    /// Register an enumeration. Fields of enum type are laid out as `unsigned int`.
    pub fn register_enum(
        &self,
        name: impl Into<String>,
        variants: Vec<String>,
    ) -> Result<(), RegistrationError> {
        let name = name.into().trim().to_string();
        let mut inner = self.inner.write();

        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if DataType::from_name(&name).is_some() {
            return Err(RegistrationError::ReservedName { name });
        }
        if let Some(existing) = inner.enums.get(&name) {
            if *existing == variants {
                return Ok(());
            }
            return Err(RegistrationError::Conflict { name });
        }
        if inner.is_taken(&name) {
            return Err(RegistrationError::Conflict { name });
        }
        inner.enums.insert(name, variants);
        Ok(())
    }

    /// Descriptor for a registered id.
    pub fn resolve(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().types.get(id.index()).cloned()
    }

    /// Look up a compound type by name, following aliases.
    pub fn find_by_name(&self, name: &str) -> Option<TypeId> {
        let inner = self.inner.read();
        let (resolved, _) = inner.substitute(name).ok()?;
        inner.by_name.get(&resolved).copied()
    }

    /// Descriptor for a compound type name, following aliases.
    pub fn descriptor_by_name(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let inner = self.inner.read();
        let (resolved, _) = inner.substitute(name).ok()?;
        let id = inner.by_name.get(&resolved)?;
        inner.types.get(id.index()).cloned()
    }

    /// Resolve any type name to an atomic type or a compound id.
    pub fn resolve_name(&self, name: &str) -> Result<ResolvedType, RegistrationError> {
        let inner = self.inner.read();
        let (resolved, _) = inner.substitute(name)?;
        if let Some(dt) = DataType::from_name(&resolved) {
            return Ok(ResolvedType::Atomic(dt));
        }
        inner
            .by_name
            .get(&resolved)
            .map(|&id| ResolvedType::Compound(id))
            .ok_or(RegistrationError::UnknownName { name: resolved })
    }

    /// Variants of a registered enumeration.
    pub fn enum_variants(&self, name: &str) -> Option<Vec<String>> {
        self.inner.read().enums.get(name).cloned()
    }

    /// Registered compound type names, in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.inner
            .read()
            .types
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    /// Compound types reachable from `root` (including itself), breadth first.
    pub fn reachable(&self, root: TypeId) -> Vec<Arc<TypeDescriptor>> {
        let inner = self.inner.read();
        let mut out: Vec<Arc<TypeDescriptor>> = Vec::new();
        let mut seen = HashSet::new();
        let Some(first) = inner.types.get(root.index()) else {
            return out;
        };
        seen.insert(first.name.clone());
        out.push(Arc::clone(first));

        let mut cursor = 0;
        while cursor < out.len() {
            let deps: Vec<String> = out[cursor]
                .compound_dependencies()
                .map(str::to_string)
                .collect();
            for dep in deps {
                if seen.insert(dep.clone()) {
                    if let Some(id) = inner.by_name.get(&dep) {
                        out.push(Arc::clone(&inner.types[id.index()]));
                    }
                }
            }
            cursor += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::new(PointerWidth::Eight)
    }

    #[test]
    fn test_register_and_resolve() {
        let reg = registry();
        let id = reg
            .register(TypeDefinition::new(
                "Point",
                vec![FieldSpec::new("x", "double"), FieldSpec::new("y", "double")],
            ))
            .unwrap();
        let desc = reg.resolve(id).unwrap();
        assert_eq!(desc.byte_size, 16);
        assert_eq!(desc.fields[1].byte_offset, 8);
        assert_eq!(reg.find_by_name("Point"), Some(id));
    }

    #[test]
    fn test_identical_reregistration_returns_same_id() {
        let reg = registry();
        let def = TypeDefinition::new("A", vec![FieldSpec::new("n", "int")]);
        let a = reg.register(def.clone()).unwrap();
        let b = reg.register(def).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_conflicting_redefinition() {
        let reg = registry();
        reg.register(TypeDefinition::new("A", vec![FieldSpec::new("n", "int")]))
            .unwrap();
        let err = reg
            .register(TypeDefinition::new("A", vec![FieldSpec::new("n", "double")]))
            .unwrap_err();
        assert_eq!(err, RegistrationError::Conflict { name: "A".into() });
    }

    #[test]
    fn test_unresolved_field_fails_at_registration() {
        let reg = registry();
        let err = reg
            .register(TypeDefinition::new("A", vec![FieldSpec::new("b", "B")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Unresolved { ref target, .. } if target == "B"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_chained_aliases_resolve() {
        let reg = registry();
        reg.register_alias("time_t2", "time_t1", false).unwrap();
        reg.register_alias("time_t1", "double", false).unwrap();
        let id = reg
            .register(TypeDefinition::new("T", vec![FieldSpec::new("t", "time_t2")]))
            .unwrap();
        let desc = reg.resolve(id).unwrap();
        assert_eq!(desc.fields[0].data_type, DataType::Double);
        assert_eq!(desc.fields[0].type_name, "double");
    }

    #[test]
    fn test_alias_adds_pointer() {
        let reg = registry();
        reg.register_alias("dptr", "double", true).unwrap();
        let id = reg
            .register(TypeDefinition::new(
                "T",
                vec![FieldSpec::new("c", "char"), FieldSpec::new("p", "dptr")],
            ))
            .unwrap();
        let field = &reg.resolve(id).unwrap().fields[1];
        assert!(field.is_pointer);
        assert_eq!(field.byte_offset, 8);
        assert_eq!(field.element_size, 8);
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let reg = registry();
        reg.register_alias("a", "b", false).unwrap();
        let err = reg.register_alias("b", "a", false).unwrap_err();
        assert!(matches!(err, RegistrationError::AliasCycle { .. }));
        assert!(reg.resolve_name("a").is_err());
    }

    #[test]
    fn test_enum_lays_out_as_unsigned_int() {
        let reg = registry();
        reg.register_enum("Mode", vec!["ON".into(), "OFF".into()])
            .unwrap();
        let id = reg
            .register(TypeDefinition::new("T", vec![FieldSpec::new("m", "Mode")]))
            .unwrap();
        assert_eq!(reg.resolve(id).unwrap().fields[0].data_type, DataType::UInt);
    }

    #[test]
    fn test_self_reference_requires_pointer() {
        let reg = registry();
        let err = reg
            .register(TypeDefinition::new("Node", vec![FieldSpec::new("next", "Node")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::RecursiveField { .. }));

        let id = reg
            .register(TypeDefinition::new(
                "Node",
                vec![
                    FieldSpec::new("value", "int"),
                    FieldSpec::new("next", "Node").pointer(),
                ],
            ))
            .unwrap();
        assert_eq!(reg.resolve(id).unwrap().byte_size, 16);
    }

    #[test]
    fn test_reachable_types() {
        let reg = registry();
        let inner = reg
            .register(TypeDefinition::new("Inner", vec![FieldSpec::new("v", "float")]))
            .unwrap();
        let outer = reg
            .register(TypeDefinition::new(
                "Outer",
                vec![
                    FieldSpec::new("a", "Inner"),
                    FieldSpec::new("b", "Inner").pointer(),
                ],
            ))
            .unwrap();
        let names: Vec<String> = reg.reachable(outer).iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["Outer".to_string(), "Inner".to_string()]);
        assert_eq!(reg.reachable(inner).len(), 1);
    }

    #[test]
    fn test_invalid_shapes() {
        let reg = registry();
        let err = reg
            .register(TypeDefinition::new(
                "T",
                vec![FieldSpec::new("a", "int").shape(vec![2, 0])],
            ))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidShape { .. }));
    }
}

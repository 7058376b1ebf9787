// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structure instances.
//!
//! An [`Instance`] is a root block of one or more structs of a registered
//! type plus the [`Heap`] owning every block reachable from it. Pointer
//! fields refer to heap nodes by id, so a tree can be walked, encoded and
//! freed without aliasing.
//!
//! # Example
//!
//! ```rust
//! use uda::instance::{Instance, Value};
//! use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};
//!
//! let registry = TypeRegistry::new(PointerWidth::Eight);
//! let id = registry
//!     .register(
//!         TypeDefinitionBuilder::new("Trace")
//!             .string_field("name")
//!             .pointer_field("samples", DataType::Float)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut trace = Instance::new(&registry, id).unwrap();
//! trace.set("name", "ip").unwrap();
//! trace
//!     .set_pointer("samples", "float", vec![Value::Float(1.0), Value::Float(2.0)])
//!     .unwrap();
//! assert_eq!(trace.pointee("samples").unwrap().elements.len(), 2);
//! assert_eq!(trace.ledger().len(), 2);
//! ```

mod value;

pub use value::Value;

use crate::buffer::TypedBuffer;
use crate::config::MAX_NESTING_DEPTH;
use crate::ledger::{AllocationLedger, FreeReport, Heap, Node, NodeId};
use crate::types::{DataType, TypeId, TypeRegistry};
use thiserror::Error;

/// Instance access failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("unknown type {0}")]
    UnknownType(TypeId),

    #[error("'{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("element {index} out of range ({count} elements)")]
    ElementOutOfRange { index: usize, count: usize },

    #[error("field '{field}' is not a pointer")]
    NotAPointer { field: String },

    #[error("member '{member}' is not an atomic scalar")]
    NotAtomic { member: String },

    #[error("field '{field}' holds {expected}, cannot store {found}")]
    ValueMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A structure instance and the heap that owns it.
#[derive(Debug, Clone)]
pub struct Instance {
    type_name: String,
    type_id: TypeId,
    root: NodeId,
    heap: Heap,
}

impl Instance {
    /// One default-initialized struct of `type_id`.
    pub fn new(registry: &TypeRegistry, type_id: TypeId) -> Result<Self, InstanceError> {
        Self::with_count(registry, type_id, 1, Heap::new())
    }

    /// `count` default-initialized structs in a caller-supplied heap.
    pub fn with_count(
        registry: &TypeRegistry,
        type_id: TypeId,
        count: usize,
        mut heap: Heap,
    ) -> Result<Self, InstanceError> {
        let desc = registry
            .resolve(type_id)
            .ok_or(InstanceError::UnknownType(type_id))?;
        let element = Value::default_struct(registry, &desc);
        let root = heap.alloc(&desc.name, vec![element; count]);
        Ok(Self {
            type_name: desc.name.clone(),
            type_id,
            root,
            heap,
        })
    }

    pub(crate) fn from_parts(type_name: String, type_id: TypeId, root: NodeId, heap: Heap) -> Self {
        Self {
            type_name,
            type_id,
            root,
            heap,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of root structs.
    pub fn count(&self) -> usize {
        self.heap.get(self.root).map_or(0, |n| n.elements.len())
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn ledger(&self) -> &AllocationLedger {
        self.heap.ledger()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.heap.get(id)
    }

    /// Root struct `index`.
    pub fn element(&self, index: usize) -> Option<&Value> {
        self.heap.get(self.root)?.elements.get(index)
    }

    /// Field of the first root struct.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.element(0)?.as_struct()?.get(field)
    }

    /// Set a field of the first root struct.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), InstanceError> {
        self.set_at(0, field, value)
    }

    /// Set a field of root struct `index`.
    ///
    /// The value is converted to the field's declared type; values that do
    /// not convert exactly are rejected.
    pub fn set_at(
        &mut self,
        index: usize,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), InstanceError> {
        let type_name = self.type_name.clone();
        let node = self
            .heap
            .get_mut(self.root)
            .ok_or(InstanceError::UnknownType(self.type_id))?;
        let count = node.elements.len();
        let map = node
            .elements
            .get_mut(index)
            .and_then(Value::as_struct_mut)
            .ok_or(InstanceError::ElementOutOfRange { index, count })?;
        let slot = map.get_mut(field).ok_or_else(|| InstanceError::UnknownField {
            type_name,
            field: field.to_string(),
        })?;
        let value = value.into();
        let found = value.kind_name();
        let expected = slot.kind_name();
        let conformed = value
            .conform(slot)
            .ok_or_else(|| InstanceError::ValueMismatch {
                field: field.to_string(),
                expected,
                found,
            })?;
        *slot = conformed;
        Ok(())
    }

    /// Allocate a block in this instance's heap.
    ///
    /// Elements of an atomic block are converted to that type where exact;
    /// anything else is left for the encoder to reject.
    pub fn alloc(&mut self, type_name: &str, elements: Vec<Value>) -> NodeId {
        let elements = match DataType::from_name(type_name).filter(|dt| dt.is_atomic()) {
            Some(data_type) => elements
                .into_iter()
                .map(|v| v.convert_to(data_type).unwrap_or(v))
                .collect(),
            None => elements,
        };
        self.heap.alloc(type_name, elements)
    }

    /// Allocate `elements` and point `field` of the first root struct at them.
    pub fn set_pointer(
        &mut self,
        field: &str,
        type_name: &str,
        elements: Vec<Value>,
    ) -> Result<NodeId, InstanceError> {
        match self.get(field) {
            Some(Value::Pointer(_)) => {}
            Some(_) => {
                return Err(InstanceError::NotAPointer {
                    field: field.to_string(),
                })
            }
            None => {
                return Err(InstanceError::UnknownField {
                    type_name: self.type_name.clone(),
                    field: field.to_string(),
                })
            }
        }
        let id = self.alloc(type_name, elements);
        self.set(field, Value::Pointer(Some(id)))?;
        Ok(id)
    }

    /// Block pointed to by `field` of the first root struct.
    pub fn pointee(&self, field: &str) -> Option<&Node> {
        match self.get(field)? {
            Value::Pointer(Some(id)) => self.heap.get(*id),
            _ => None,
        }
    }

    /// Values of an atomic scalar member across all root structs.
    pub fn member_buffer(&self, member: &str) -> Result<TypedBuffer, InstanceError> {
        let node = self
            .heap
            .get(self.root)
            .ok_or(InstanceError::UnknownType(self.type_id))?;
        let mut values = Vec::with_capacity(node.elements.len());
        for element in &node.elements {
            let v = element
                .as_struct()
                .and_then(|m| m.get(member))
                .ok_or_else(|| InstanceError::UnknownField {
                    type_name: self.type_name.clone(),
                    field: member.to_string(),
                })?;
            values.push(v.clone());
        }
        let data_type = values
            .first()
            .map(Value::data_type)
            .filter(|dt| dt.is_atomic())
            .ok_or_else(|| InstanceError::NotAtomic {
                member: member.to_string(),
            })?;
        TypedBuffer::from_values(data_type, &values).ok_or_else(|| InstanceError::NotAtomic {
            member: member.to_string(),
        })
    }

    /// Structural equality, following pointers into each heap.
    pub fn deep_eq(&self, other: &Instance) -> bool {
        self.type_name == other.type_name
            && nodes_eq(&self.heap, self.root, &other.heap, other.root, 0)
    }

    /// Release every block of the tree through its ledger.
    pub fn free(mut self) -> FreeReport {
        self.heap.free_all()
    }
}

fn nodes_eq(a: &Heap, a_id: NodeId, b: &Heap, b_id: NodeId, depth: usize) -> bool {
    if depth > MAX_NESTING_DEPTH {
        return false;
    }
    match (a.get(a_id), b.get(b_id)) {
        (Some(na), Some(nb)) => {
            na.type_name == nb.type_name
                && na.elements.len() == nb.elements.len()
                && na
                    .elements
                    .iter()
                    .zip(&nb.elements)
                    .all(|(x, y)| values_eq(a, x, b, y, depth + 1))
        }
        _ => false,
    }
}

fn values_eq(a: &Heap, x: &Value, b: &Heap, y: &Value, depth: usize) -> bool {
    if depth > MAX_NESTING_DEPTH {
        return false;
    }
    match (x, y) {
        (Value::Pointer(None), Value::Pointer(None)) => true,
        // A zero-length block and a null pointer are the same thing on the wire.
        (Value::Pointer(None), Value::Pointer(Some(q))) => is_empty_block(b, *q),
        (Value::Pointer(Some(p)), Value::Pointer(None)) => is_empty_block(a, *p),
        (Value::Pointer(Some(p)), Value::Pointer(Some(q))) => nodes_eq(a, *p, b, *q, depth + 1),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| values_eq(a, x, b, y, depth + 1))
        }
        (Value::Struct(mx), Value::Struct(my)) => {
            mx.len() == my.len()
                && mx.iter().all(|(k, vx)| {
                    my.get(k)
                        .is_some_and(|vy| values_eq(a, vx, b, vy, depth + 1))
                })
        }
        (Value::Float(p), Value::Float(q)) => p.to_bits() == q.to_bits(),
        (Value::Double(p), Value::Double(q)) => p.to_bits() == q.to_bits(),
        (x, y) => x == y,
    }
}

fn is_empty_block(heap: &Heap, id: NodeId) -> bool {
    heap.get(id).map_or(true, |n| n.elements.is_empty())
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance encoder. Encoding never allocates heap blocks.

use super::types::write_type_table;
use super::wire::{write_atomic, write_count, write_string};
use super::{EncodeError, WireCodec};
use crate::config::{INSTANCE_MAGIC, INSTANCE_VERSION};
use crate::instance::{Instance, Value};
use crate::ledger::Heap;
use crate::types::{FieldDescriptor, TypeDescriptor, TypeId, TypeRegistry};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

impl WireCodec<'_> {
    /// Encode `instance` as type `type_id` into `sink`.
    pub fn encode<W: Write>(
        &self,
        instance: &Instance,
        type_id: TypeId,
        sink: &mut W,
    ) -> Result<(), EncodeError> {
        let desc = self
            .registry
            .resolve(type_id)
            .ok_or(EncodeError::UnknownType(type_id))?;
        if desc.name != instance.type_name() {
            return Err(EncodeError::TypeMismatch {
                expected: desc.name.clone(),
                found: instance.type_name().to_string(),
            });
        }
        let root = instance
            .node(instance.root())
            .ok_or(EncodeError::DanglingPointer {
                field: desc.name.clone(),
                node: instance.root(),
            })?;

        sink.write_all(&INSTANCE_MAGIC)?;
        sink.write_u16::<BigEndian>(INSTANCE_VERSION)?;
        write_type_table(sink, &self.registry.reachable(type_id))?;
        write_string(sink, &desc.name)?;
        write_count(sink, root.elements.len())?;

        let writer = StructWriter {
            registry: self.registry,
            heap: instance.heap(),
            max_depth: self.limits.max_depth,
        };
        for element in &root.elements {
            writer.write_struct(sink, &desc, element, 0)?;
        }
        log::debug!(
            "[codec] encoded {} x{} ({} blocks)",
            desc.name,
            root.elements.len(),
            instance.ledger().len()
        );
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn encode_to_vec(&self, instance: &Instance, type_id: TypeId) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode(instance, type_id, &mut out)?;
        Ok(out)
    }
}

struct StructWriter<'a> {
    registry: &'a TypeRegistry,
    heap: &'a Heap,
    max_depth: usize,
}

impl StructWriter<'_> {
    fn write_struct<W: Write>(
        &self,
        w: &mut W,
        desc: &TypeDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::DepthExceeded(self.max_depth));
        }
        let map = value.as_struct().ok_or_else(|| EncodeError::ValueMismatch {
            field: desc.name.clone(),
            expected: desc.name.clone(),
            found: value.kind_name(),
        })?;
        for field in &desc.fields {
            let v = map.get(&field.name).ok_or_else(|| EncodeError::MissingValue {
                type_name: desc.name.clone(),
                field: field.name.clone(),
            })?;
            self.write_field(w, field, v, depth)?;
        }
        Ok(())
    }

    fn write_field<W: Write>(
        &self,
        w: &mut W,
        field: &FieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if field.is_pointer {
            return match value {
                Value::Pointer(None) => write_count(w, 0),
                Value::Pointer(Some(id)) => {
                    let node = self.heap.get(*id).ok_or(EncodeError::DanglingPointer {
                        field: field.name.clone(),
                        node: *id,
                    })?;
                    write_count(w, node.elements.len())?;
                    node.elements
                        .iter()
                        .try_for_each(|e| self.write_element(w, field, e, depth + 1))
                }
                other => Err(mismatch(field, "pointer", other)),
            };
        }
        if field.is_scalar() {
            return self.write_element(w, field, value, depth);
        }
        match value {
            Value::Array(items) if items.len() == field.element_count => items
                .iter()
                .try_for_each(|e| self.write_element(w, field, e, depth)),
            other => Err(mismatch(
                field,
                &format!("array of {} {}", field.element_count, field.type_name),
                other,
            )),
        }
    }

    fn write_element<W: Write>(
        &self,
        w: &mut W,
        field: &FieldDescriptor,
        value: &Value,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if field.is_compound() {
            let sub = self
                .registry
                .descriptor_by_name(&field.type_name)
                .ok_or_else(|| EncodeError::UnknownTypeName(field.type_name.clone()))?;
            self.write_struct(w, &sub, value, depth + 1)
        } else {
            write_atomic(w, field.data_type, value, &field.name)
        }
    }
}

fn mismatch(field: &FieldDescriptor, expected: &str, found: &Value) -> EncodeError {
    EncodeError::ValueMismatch {
        field: field.name.clone(),
        expected: expected.to_string(),
        found: found.kind_name(),
    }
}

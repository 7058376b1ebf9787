// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance decoder.
//!
//! Every block created while decoding is allocated through the caller's
//! [`Heap`] and therefore recorded in its ledger. On failure the partially
//! built heap is dropped, which releases whatever was recorded so far.

use super::types::read_type_table;
use super::wire::{read_atomic, read_count, read_string, skip_atomic, PREALLOC_LIMIT};
use super::{Advisory, DecodeError, Decoded, WireCodec};
use crate::config::{CodecLimits, INSTANCE_MAGIC, INSTANCE_VERSION};
use crate::instance::{Instance, Value};
use crate::ledger::Heap;
use crate::types::{
    DataType, FieldDescriptor, FieldSpec, TypeDefinition, TypeDescriptor, TypeId, TypeRegistry,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;

impl WireCodec<'_> {
    /// Decode an instance of `type_id` into a fresh heap.
    pub fn decode<R: Read>(&self, source: &mut R, type_id: TypeId) -> Result<Decoded, DecodeError> {
        self.decode_into(source, type_id, Heap::new())
    }

    /// Decode an instance of `type_id`, recording every block in `heap`.
    pub fn decode_into<R: Read>(
        &self,
        source: &mut R,
        type_id: TypeId,
        heap: Heap,
    ) -> Result<Decoded, DecodeError> {
        let local = self
            .registry
            .resolve(type_id)
            .ok_or_else(|| DecodeError::UnknownType(type_id.to_string()))?;

        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != INSTANCE_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = source.read_u16::<BigEndian>()?;
        if version != INSTANCE_VERSION {
            return Err(DecodeError::UnsupportedVersion(u32::from(version)));
        }

        let wire: HashMap<String, Arc<TypeDefinition>> = read_type_table(source, &self.limits)?
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(def)))
            .collect();
        let zero_width = zero_width_types(&wire);
        let root_name = read_string(source, self.limits.max_string_length)?;
        if root_name != local.name {
            return Err(DecodeError::TypeMismatch {
                expected: local.name.clone(),
                found: root_name,
            });
        }
        let count = read_count(source, self.limits.max_element_count)?;

        let mut reader = StructReader {
            registry: self.registry,
            limits: &self.limits,
            wire,
            zero_width,
            budget: self.limits.max_element_count,
            heap,
            advisories: Vec::new(),
        };
        reader.charge(count)?;
        let mut elements = Vec::with_capacity(count.min(PREALLOC_LIMIT));
        for _ in 0..count {
            elements.push(reader.read_struct(source, &local, 0)?);
        }
        let root = reader.heap.alloc(&local.name, elements);

        let StructReader {
            heap, advisories, ..
        } = reader;
        log::debug!(
            "[codec] decoded {} x{} ({} blocks, {} advisories)",
            local.name,
            count,
            heap.ledger().len(),
            advisories.len()
        );
        Ok(Decoded {
            instance: Instance::from_parts(local.name.clone(), type_id, root, heap),
            advisories,
        })
    }
}

struct StructReader<'a> {
    registry: &'a TypeRegistry,
    limits: &'a CodecLimits,
    wire: HashMap<String, Arc<TypeDefinition>>,
    /// Wire types whose elements occupy no bytes on the wire.
    zero_width: HashSet<String>,
    /// Elements still allowed for this decode, read or skipped.
    budget: usize,
    heap: Heap,
    advisories: Vec<Advisory>,
}

impl StructReader<'_> {
    fn wire_type(&self, name: &str) -> Result<Arc<TypeDefinition>, DecodeError> {
        self.wire
            .get(name)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownType(name.to_string()))
    }

    fn charge(&mut self, count: usize) -> Result<(), DecodeError> {
        self.budget = self
            .budget
            .checked_sub(count)
            .ok_or(DecodeError::CountOutOfRange {
                count: count as u64,
                limit: self.limits.max_element_count,
            })?;
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), DecodeError> {
        if depth > self.limits.max_depth {
            return Err(DecodeError::DepthExceeded(self.limits.max_depth));
        }
        Ok(())
    }

    fn read_struct<R: Read>(
        &mut self,
        r: &mut R,
        local: &TypeDescriptor,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        self.check_depth(depth)?;
        let wire = self.wire_type(&local.name)?;
        let mut map = HashMap::with_capacity(local.fields.len());

        for wire_field in &wire.fields {
            match local.field(&wire_field.name) {
                Some(field) => {
                    check_compatible(field, wire_field)?;
                    let value = self.read_field(r, field, depth)?;
                    map.insert(field.name.clone(), value);
                }
                None => {
                    self.skip_field(r, wire_field, depth)?;
                    log::debug!(
                        "[codec] skipped foreign field {}.{} ({})",
                        local.name,
                        wire_field.name,
                        wire_field.type_name
                    );
                    self.advisories.push(Advisory::ForeignField {
                        type_name: local.name.clone(),
                        field: wire_field.name.clone(),
                        wire_type: wire_field.type_name.clone(),
                    });
                }
            }
        }

        for field in &local.fields {
            if !map.contains_key(&field.name) {
                map.insert(field.name.clone(), Value::default_field(self.registry, field));
                self.advisories.push(Advisory::MissingField {
                    type_name: local.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(Value::Struct(map))
    }

    fn read_field<R: Read>(
        &mut self,
        r: &mut R,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        if field.is_pointer {
            let count = read_count(r, self.limits.max_element_count)?;
            if count == 0 {
                return Ok(Value::Pointer(None));
            }
            self.charge(count)?;
            let mut elements = Vec::with_capacity(count.min(PREALLOC_LIMIT));
            for _ in 0..count {
                elements.push(self.read_element(r, field, depth + 1)?);
            }
            let id = self.heap.alloc(&field.type_name, elements);
            return Ok(Value::Pointer(Some(id)));
        }
        if field.is_scalar() {
            return self.read_element(r, field, depth);
        }
        let mut items = Vec::with_capacity(field.element_count.min(PREALLOC_LIMIT));
        for _ in 0..field.element_count {
            items.push(self.read_element(r, field, depth)?);
        }
        Ok(Value::Array(items))
    }

    fn read_element<R: Read>(
        &mut self,
        r: &mut R,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        if field.is_compound() {
            let sub = self
                .registry
                .descriptor_by_name(&field.type_name)
                .ok_or_else(|| DecodeError::UnknownType(field.type_name.clone()))?;
            self.read_struct(r, &sub, depth + 1)
        } else {
            read_atomic(r, field.data_type, self.limits)
        }
    }

    /// Consume a field described only by the wire table.
    fn skip_field<R: Read>(
        &mut self,
        r: &mut R,
        field: &FieldSpec,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let repeat = if field.pointer {
            read_count(r, self.limits.max_element_count)?
        } else {
            shape_count(&field.shape, self.limits.max_element_count)?
        };
        if self.zero_width.contains(&field.type_name) {
            return Ok(());
        }
        self.charge(repeat)?;
        for _ in 0..repeat {
            self.skip_element(r, &field.type_name, depth + 1)?;
        }
        Ok(())
    }

    fn skip_element<R: Read>(
        &mut self,
        r: &mut R,
        type_name: &str,
        depth: usize,
    ) -> Result<(), DecodeError> {
        if let Some(dt) = DataType::from_name(type_name).filter(|dt| dt.is_atomic()) {
            return skip_atomic(r, dt, self.limits);
        }
        self.check_depth(depth)?;
        let wire = self.wire_type(type_name)?;
        for field in &wire.fields {
            self.skip_field(r, field, depth)?;
        }
        Ok(())
    }
}

/// Wire types that encode to zero bytes: every field is an inline compound
/// of another such type. Computed as a greatest fixed point, so inline
/// cycles land in the set as well.
fn zero_width_types(wire: &HashMap<String, Arc<TypeDefinition>>) -> HashSet<String> {
    let mut set: HashSet<String> = wire
        .values()
        .filter(|def| DataType::from_name(&def.name).is_none())
        .filter(|def| {
            def.fields
                .iter()
                .all(|f| !f.pointer && wire.contains_key(&f.type_name))
        })
        .map(|def| def.name.clone())
        .collect();
    loop {
        let dropped: Vec<String> = set
            .iter()
            .filter(|name| {
                wire.get(name.as_str())
                    .map_or(true, |def| def.fields.iter().any(|f| !set.contains(&f.type_name)))
            })
            .cloned()
            .collect();
        if dropped.is_empty() {
            return set;
        }
        for name in &dropped {
            set.remove(name);
        }
    }
}

/// Elements of a fixed shape (1 for a scalar), bounded by `limit`.
fn shape_count(shape: &[usize], limit: usize) -> Result<usize, DecodeError> {
    let count = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= limit);
    count.ok_or(DecodeError::CountOutOfRange {
        count: shape.iter().map(|&d| d as u64).fold(1u64, u64::saturating_mul),
        limit,
    })
}

fn check_compatible(local: &FieldDescriptor, wire: &FieldSpec) -> Result<(), DecodeError> {
    let type_matches = if local.is_compound() {
        wire.type_name == local.type_name
    } else {
        DataType::from_name(&wire.type_name) == Some(local.data_type)
    };
    if !type_matches || wire.pointer != local.is_pointer {
        return Err(DecodeError::TypeMismatch {
            expected: describe(&local.type_name, local.is_pointer),
            found: describe(&wire.type_name, wire.pointer),
        });
    }
    if wire.shape != local.shape {
        return Err(DecodeError::ShapeMismatch {
            field: local.name.clone(),
            expected: local.shape.clone(),
            found: wire.shape.clone(),
        });
    }
    Ok(())
}

fn describe(type_name: &str, pointer: bool) -> String {
    if pointer {
        format!("{type_name} *")
    } else {
        type_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::write_type_table;
    use super::super::wire::write_string;
    use super::*;
    use crate::types::{PointerWidth, TypeDefinitionBuilder};

    fn sender() -> (TypeRegistry, TypeId) {
        let registry = TypeRegistry::new(PointerWidth::Eight);
        registry
            .register(
                TypeDefinitionBuilder::new("Tag")
                    .string_field("key")
                    .array_field("code", DataType::UChar, vec![2, 2])
                    .build(),
            )
            .unwrap();
        let id = registry
            .register(
                TypeDefinitionBuilder::new("Sensor")
                    .field("channel", DataType::Int)
                    .field("gain", DataType::Double)
                    .struct_pointer_field("tags", "Tag")
                    .build(),
            )
            .unwrap();
        (registry, id)
    }

    fn sample(registry: &TypeRegistry, id: TypeId) -> Instance {
        let tag = registry.descriptor_by_name("Tag").unwrap();
        let mut element = Value::default_struct(registry, &tag);
        if let Some(map) = element.as_struct_mut() {
            map.insert("key".into(), Value::Str("coil".into()));
        }
        let mut sensor = Instance::new(registry, id).unwrap();
        sensor.set("channel", 4i32).unwrap();
        sensor.set("gain", 2.5f64).unwrap();
        sensor.set_pointer("tags", "Tag", vec![element; 2]).unwrap();
        sensor
    }

    #[test]
    fn test_roundtrip_nested_pointers() {
        let (registry, id) = sender();
        let sensor = sample(&registry, id);
        let codec = WireCodec::new(&registry);
        let bytes = codec.encode_to_vec(&sensor, id).unwrap();
        let decoded = codec.decode(&mut bytes.as_slice(), id).unwrap();

        assert!(decoded.instance.deep_eq(&sensor));
        assert!(decoded.advisories.is_empty());
        assert_eq!(decoded.instance.ledger().len(), 2);
    }

    #[test]
    fn test_foreign_and_missing_fields() {
        let (registry, id) = sender();
        let bytes = WireCodec::new(&registry)
            .encode_to_vec(&sample(&registry, id), id)
            .unwrap();

        let receiver = TypeRegistry::new(PointerWidth::Four);
        let local = receiver
            .register(
                TypeDefinitionBuilder::new("Sensor")
                    .field("channel", DataType::Int)
                    .field("offset", DataType::Float)
                    .build(),
            )
            .unwrap();
        let decoded = WireCodec::new(&receiver)
            .decode(&mut bytes.as_slice(), local)
            .unwrap();

        assert_eq!(decoded.instance.get("channel"), Some(&Value::Int(4)));
        assert_eq!(decoded.instance.get("offset"), Some(&Value::Float(0.0)));
        assert_eq!(decoded.advisories.len(), 3);
        assert!(decoded.advisories.contains(&Advisory::ForeignField {
            type_name: "Sensor".into(),
            field: "tags".into(),
            wire_type: "Tag".into(),
        }));
        assert!(decoded.advisories.contains(&Advisory::MissingField {
            type_name: "Sensor".into(),
            field: "offset".into(),
        }));
        // Only the root block: skipped pointees are never materialized.
        assert_eq!(decoded.instance.ledger().len(), 1);
    }

    #[test]
    fn test_truncated_stream() {
        let (registry, id) = sender();
        let codec = WireCodec::new(&registry);
        let bytes = codec.encode_to_vec(&sample(&registry, id), id).unwrap();
        for cut in [0, 3, 10, bytes.len() - 1] {
            let err = codec.decode(&mut &bytes[..cut], id).unwrap_err();
            assert!(matches!(err, DecodeError::Eof), "cut {cut}: {err}");
        }
    }

    #[test]
    fn test_bad_magic() {
        let (registry, id) = sender();
        let bytes = b"XXXX\0\x01".to_vec();
        let err = WireCodec::new(&registry)
            .decode(&mut bytes.as_slice(), id)
            .unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic));
    }

    #[test]
    fn test_count_ceiling() {
        let (registry, id) = sender();
        let codec = WireCodec::new(&registry);
        let bytes = codec.encode_to_vec(&sample(&registry, id), id).unwrap();
        let strict = codec.with_limits(CodecLimits {
            max_element_count: 1,
            ..CodecLimits::default()
        });
        let err = strict.decode(&mut bytes.as_slice(), id).unwrap_err();
        assert!(matches!(err, DecodeError::CountOutOfRange { count: 2, limit: 1 }));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = TypeRegistry::new(PointerWidth::Eight);
        let a_id = a
            .register(
                TypeDefinitionBuilder::new("Grid")
                    .array_field("v", DataType::Int, vec![4])
                    .build(),
            )
            .unwrap();
        let b = TypeRegistry::new(PointerWidth::Eight);
        let b_id = b
            .register(
                TypeDefinitionBuilder::new("Grid")
                    .array_field("v", DataType::Int, vec![2, 2])
                    .build(),
            )
            .unwrap();

        let bytes = WireCodec::new(&a)
            .encode_to_vec(&Instance::new(&a, a_id).unwrap(), a_id)
            .unwrap();
        let err = WireCodec::new(&b)
            .decode(&mut bytes.as_slice(), b_id)
            .unwrap_err();
        assert!(matches!(err, DecodeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_root_type_mismatch() {
        let (registry, id) = sender();
        let tag = registry.find_by_name("Tag").unwrap();
        let bytes = WireCodec::new(&registry)
            .encode_to_vec(&sample(&registry, id), id)
            .unwrap();
        let err = WireCodec::new(&registry)
            .decode(&mut bytes.as_slice(), tag)
            .unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }

    /// Instance stream of one `root` struct declared by `sender`, with a
    /// hand-written body.
    fn stream(sender: &TypeRegistry, root: &str, body: &[u8]) -> Vec<u8> {
        let types: Vec<Arc<TypeDescriptor>> = sender
            .type_names()
            .iter()
            .map(|name| sender.descriptor_by_name(name).unwrap())
            .collect();
        let mut out = INSTANCE_MAGIC.to_vec();
        out.extend_from_slice(&INSTANCE_VERSION.to_be_bytes());
        write_type_table(&mut out, &types).unwrap();
        write_string(&mut out, root).unwrap();
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn receiver_with_n() -> (TypeRegistry, TypeId) {
        let receiver = TypeRegistry::new(PointerWidth::Eight);
        let id = receiver
            .register(TypeDefinitionBuilder::new("R").field("n", DataType::Int).build())
            .unwrap();
        (receiver, id)
    }

    #[test]
    fn test_nested_empty_foreign_arrays_are_skipped() {
        let sender = TypeRegistry::new(PointerWidth::Eight);
        sender.register(TypeDefinitionBuilder::new("C").build()).unwrap();
        for (name, field, inner) in [("B", "h", "C"), ("A", "g", "B")] {
            sender
                .register(
                    TypeDefinitionBuilder::new(name)
                        .field_spec(FieldSpec::new(field, inner).shape(vec![65536]))
                        .build(),
                )
                .unwrap();
        }
        sender
            .register(
                TypeDefinitionBuilder::new("R")
                    .field_spec(FieldSpec::new("f", "A").shape(vec![65536]))
                    .field("n", DataType::Int)
                    .build(),
            )
            .unwrap();

        let bytes = stream(&sender, "R", &7i32.to_be_bytes());
        let (receiver, id) = receiver_with_n();
        let decoded = WireCodec::new(&receiver)
            .decode(&mut bytes.as_slice(), id)
            .unwrap();
        assert_eq!(decoded.instance.get("n"), Some(&Value::Int(7)));
        assert_eq!(
            decoded.advisories,
            vec![Advisory::ForeignField {
                type_name: "R".into(),
                field: "f".into(),
                wire_type: "A".into(),
            }]
        );
    }

    #[test]
    fn test_skipped_elements_share_the_count_ceiling() {
        let sender = TypeRegistry::new(PointerWidth::Eight);
        sender
            .register(
                TypeDefinitionBuilder::new("S")
                    .array_field("v", DataType::Double, vec![8])
                    .build(),
            )
            .unwrap();
        sender
            .register(
                TypeDefinitionBuilder::new("R")
                    .field_spec(FieldSpec::new("items", "S").shape(vec![20]))
                    .field("n", DataType::Int)
                    .build(),
            )
            .unwrap();
        let mut body = vec![0u8; 20 * 8 * 8];
        body.extend_from_slice(&3i32.to_be_bytes());
        let bytes = stream(&sender, "R", &body);

        let (receiver, id) = receiver_with_n();
        let codec = WireCodec::new(&receiver);
        let decoded = codec.decode(&mut bytes.as_slice(), id).unwrap();
        assert_eq!(decoded.instance.get("n"), Some(&Value::Int(3)));

        // 1 root + 20 structs + 160 doubles against a ceiling of 100.
        let strict = codec.with_limits(CodecLimits {
            max_element_count: 100,
            ..CodecLimits::default()
        });
        let err = strict.decode(&mut bytes.as_slice(), id).unwrap_err();
        assert!(matches!(err, DecodeError::CountOutOfRange { limit: 100, .. }));
    }

    #[test]
    fn test_zero_width_types() {
        let defs = [
            TypeDefinition::new("Empty", vec![]),
            TypeDefinition::new("Wrap", vec![FieldSpec::new("e", "Empty").shape(vec![4])]),
            TypeDefinition::new("Loop", vec![FieldSpec::new("again", "Loop")]),
            TypeDefinition::new("Ref", vec![FieldSpec::new("e", "Empty").pointer()]),
            TypeDefinition::new(
                "Word",
                vec![FieldSpec::new("w", "Wrap"), FieldSpec::new("c", "char")],
            ),
        ];
        let wire = defs
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(def)))
            .collect();
        let mut names: Vec<String> = zero_width_types(&wire).into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["Empty", "Loop", "Wrap"]);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Cached Data Blocks on disk.
//
// Blocks written by one process layout (pointer width) are read back by
// another, structures payloads included; damaged files are rejected before
// any field is trusted.

#![allow(clippy::float_cmp)]
#![allow(clippy::missing_panics_doc)]

use std::fs;
use uda::block::{
    read_block_file, write_block_file, CacheError, DataBlock, Dim, Domain, EnvelopeHeader,
    ErrorModel, ErrorModelKind, OpaquePayload,
};
use uda::buffer::TypedBuffer;
use uda::codec::DecodeError;
use uda::config::CodecLimits;
use uda::instance::{Instance, Value};
use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};

fn flux_registry(width: PointerWidth) -> TypeRegistry {
    let registry = TypeRegistry::new(width);
    registry
        .register(
            TypeDefinitionBuilder::new("FluxLoop")
                .string_field("name")
                .field("r", DataType::Float)
                .field("z", DataType::Float)
                .pointer_field("psi", DataType::Double)
                .build(),
        )
        .unwrap();
    registry
}

fn profile() -> DataBlock {
    let mut block = DataBlock::with_rank(2);
    let data: Vec<f64> = (0..12).map(|i| f64::from(i) * 0.25).collect();
    block
        .set_data(TypedBuffer::Double(data), DataType::Double, 12)
        .unwrap();
    block.set_error(TypedBuffer::Double(vec![0.01; 12])).unwrap();
    block
        .set_dim(
            0,
            Dim::explicit(TypedBuffer::Float(vec![0.5, 0.75, 1.0])).with_label("R", "m"),
        )
        .unwrap();
    block
        .set_dim(
            1,
            Dim::analytic(
                DataType::Double,
                vec![Domain::new(0.0, 0.1, 2), Domain::new(1.0, 0.5, 2)],
            )
            .with_label("time", "s"),
        )
        .unwrap();
    block.set_order(Some(1)).unwrap();
    block.set_label("Te");
    block.set_units("eV");
    block.set_description("electron temperature profile");
    block.set_error_model(Some(ErrorModel::new(ErrorModelKind::Default, vec![0.01, 0.0])));
    block
}

#[test]
fn block_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("te.blk");
    let registry = TypeRegistry::new(PointerWidth::Eight);

    let block = profile();
    write_block_file(&path, &block, &registry).unwrap();
    let back = read_block_file(&path, &registry, &CodecLimits::default()).unwrap();

    assert_eq!(back, block);
    assert!(back.dims()[1].is_analytic());
    assert_eq!(back.dims()[1].values_f64().unwrap(), vec![0.0, 0.1, 1.0, 1.5]);
    assert_eq!(back.order(), 1);
}

#[test]
fn structures_payload_crosses_pointer_widths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flux.blk");

    let writer = flux_registry(PointerWidth::Four);
    let id = writer.find_by_name("FluxLoop").unwrap();
    let mut loops = Instance::with_count(&writer, id, 2, uda::ledger::Heap::new()).unwrap();
    for (i, name) in ["fl01", "fl02"].iter().enumerate() {
        loops.set_at(i, "name", *name).unwrap();
        loops.set_at(i, "r", 1.5f32 + i as f32).unwrap();
        loops.set_at(i, "z", -0.25f32).unwrap();
    }
    loops
        .set_pointer("psi", "double", vec![Value::Double(0.1), Value::Double(0.2)])
        .unwrap();

    let mut block = DataBlock::new_empty();
    block.set_opaque(OpaquePayload::Structures(loops.clone()));
    write_block_file(&path, &block, &writer).unwrap();

    let reader = flux_registry(PointerWidth::Eight);
    let back = read_block_file(&path, &reader, &CodecLimits::default()).unwrap();
    let instance = back.opaque().as_instance().unwrap();
    assert!(instance.deep_eq(&loops));
    assert_eq!(instance.count(), 2);
    assert_eq!(
        instance.member_buffer("r").unwrap(),
        TypedBuffer::Float(vec![1.5, 2.5])
    );
}

#[test]
fn unknown_payload_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flux.blk");

    let writer = flux_registry(PointerWidth::Eight);
    let id = writer.find_by_name("FluxLoop").unwrap();
    let mut block = DataBlock::new_empty();
    block.set_opaque(OpaquePayload::Structures(Instance::new(&writer, id).unwrap()));
    write_block_file(&path, &block, &writer).unwrap();

    let empty = TypeRegistry::new(PointerWidth::Eight);
    let err = read_block_file(&path, &empty, &CodecLimits::default()).unwrap_err();
    assert!(matches!(err, CacheError::Decode(DecodeError::UnknownType(_))));
}

#[test]
fn damaged_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("te.blk");
    let registry = TypeRegistry::new(PointerWidth::Eight);
    write_block_file(&path, &profile(), &registry).unwrap();
    let pristine = fs::read(&path).unwrap();

    // One flipped bit anywhere in the body fails the checksum.
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..32 {
        let mut bytes = pristine.clone();
        let at = rng.usize(EnvelopeHeader::SIZE..pristine.len());
        bytes[at] ^= 1 << rng.u8(0..8);
        fs::write(&path, &bytes).unwrap();
        let err = read_block_file(&path, &registry, &CodecLimits::default()).unwrap_err();
        assert!(matches!(err, CacheError::Checksum { .. }), "byte {at}: {err}");
    }

    fs::write(&path, &pristine[..pristine.len() / 2]).unwrap();
    let err = read_block_file(&path, &registry, &CodecLimits::default()).unwrap_err();
    assert!(matches!(err, CacheError::Length { .. }));

    let missing = dir.path().join("absent.blk");
    let err = read_block_file(&missing, &registry, &CodecLimits::default()).unwrap_err();
    assert!(matches!(err, CacheError::Io(_)));
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use uda::codec::WireCodec;
use uda::config::CodecLimits;
use uda::ledger::{CountingObserver, Heap};
use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    if registry
        .register(
            TypeDefinitionBuilder::new("Node")
                .field("id", DataType::Int)
                .string_field("label")
                .array_field("pos", DataType::Float, vec![3])
                .pointer_field("values", DataType::Double)
                .struct_pointer_field("next", "Node")
                .build(),
        )
        .is_err()
    {
        return;
    }
    let Some(id) = registry.find_by_name("Node") else {
        return;
    };

    // Small ceilings keep hostile counts from allocating.
    let codec = WireCodec::new(&registry).with_limits(CodecLimits {
        max_element_count: 1 << 12,
        max_string_length: 1 << 12,
        max_depth: 16,
    });
    let observer = CountingObserver::new();
    let result = codec.decode_into(&mut &data[..], id, Heap::with_observer(observer.clone()));

    // Whatever the outcome, every recorded block is released exactly once.
    drop(result);
    assert_eq!(observer.outstanding(), 0);
    assert_eq!(observer.double_frees(), 0);
});

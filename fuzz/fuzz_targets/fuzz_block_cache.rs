// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use uda::block::deserialize_block;
use uda::config::CodecLimits;
use uda::types::{PointerWidth, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let limits = CodecLimits {
        max_element_count: 1 << 16,
        max_string_length: 1 << 12,
        max_depth: 16,
    };

    // Fuzz cached block deserializer (envelope, checksum, body)
    if let Ok(block) = deserialize_block(data, &registry, &limits) {
        // Anything accepted must be a consistent block.
        assert!(block.validate().is_ok());
    }
});

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use uda::action::{parse_actions, NoSignalSource};
use uda::block::{DataBlock, Dim};
use uda::buffer::TypedBuffer;
use uda::types::DataType;
use uda::{ActionEngine, RequestContext};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string (XML is text-based)
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(rules) = parse_actions(xml) else {
        return;
    };

    let mut block = DataBlock::with_rank(1);
    if block
        .set_data(TypedBuffer::Double(vec![1.0, 2.0, 3.0, 4.0]), DataType::Double, 4)
        .is_err()
        || block.set_dim(0, Dim::index(4)).is_err()
    {
        return;
    }

    // Rules that parse must never leave an inconsistent block behind.
    let mut engine = ActionEngine::new();
    engine.load(rules);
    for signal in ["ip", "", "x"] {
        let outcome = engine.apply(&RequestContext::new(signal, 1, 0), block.clone(), &NoSignalSource);
        assert!(outcome.block.validate().is_ok());
    }
});

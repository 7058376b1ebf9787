// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire Codec.
//!
//! Recursive encode/decode of structure instances, and of primitive arrays,
//! over any [`std::io::Write`] sink or [`std::io::Read`] source. Fields go on
//! the wire in declaration order, never in memory-offset order, so both ends
//! may lay out their types differently.
//!
//! # Instance stream
//!
//! ```text
//! +--------+---------+------------+-----------+-----------+----------------+
//! | "UDAS" | ver u16 | type table | root name | count u32 | struct[count]  |
//! +--------+---------+------------+-----------+-----------+----------------+
//!
//! struct  := field[nfields]                       (declaration order)
//! field   := atomic                               scalar
//!          | atomic[element_count]                fixed array, no prefix
//!          | count(u32) | element[count]          pointer (0 = null)
//!          | struct                               embedded compound
//! ```
//!
//! # Example
//!
//! ```rust
//! use uda::codec::WireCodec;
//! use uda::instance::{Instance, Value};
//! use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};
//!
//! let registry = TypeRegistry::new(PointerWidth::Eight);
//! let id = registry
//!     .register(
//!         TypeDefinitionBuilder::new("Sensor")
//!             .field("channel", DataType::Int)
//!             .pointer_field("samples", DataType::Double)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut sensor = Instance::new(&registry, id).unwrap();
//! sensor.set("channel", 3i32).unwrap();
//! sensor
//!     .set_pointer("samples", "double", vec![Value::Double(0.25); 8])
//!     .unwrap();
//!
//! let codec = WireCodec::new(&registry);
//! let bytes = codec.encode_to_vec(&sensor, id).unwrap();
//! let decoded = codec.decode(&mut bytes.as_slice(), id).unwrap();
//! assert!(decoded.instance.deep_eq(&sensor));
//! assert!(decoded.advisories.is_empty());
//! ```

mod decode;
mod encode;
mod error;
mod types;
mod wire;

pub use error::{Advisory, DecodeError, EncodeError};
pub use types::{read_type_table, write_type_table};
pub use wire::{read_array, write_array};

pub(crate) use wire::{read_count, read_string, write_count, write_string};

use crate::config::CodecLimits;
use crate::instance::Instance;
use crate::types::TypeRegistry;

/// Encoder/decoder bound to one registry.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec<'a> {
    registry: &'a TypeRegistry,
    limits: CodecLimits,
}

impl<'a> WireCodec<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            limits: CodecLimits::default(),
        }
    }

    /// Override the sanity ceilings applied while decoding.
    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn limits(&self) -> &CodecLimits {
        &self.limits
    }
}

/// A decoded instance and the soft findings made while reading it.
#[derive(Debug)]
pub struct Decoded {
    pub instance: Instance,
    pub advisories: Vec<Advisory>,
}

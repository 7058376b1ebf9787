// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # UDA core - self-describing structure marshaling and data blocks
//!
//! Run-time type description, arena-backed structure instances, a
//! layout-independent wire codec and the dimensioned Data Block returned to
//! clients of a scientific data access service, refined by a small rule
//! engine before it leaves the server.
//!
//! ## Quick Start
//!
//! ```rust
//! use uda::codec::WireCodec;
//! use uda::instance::{Instance, Value};
//! use uda::types::{DataType, PointerWidth, TypeDefinitionBuilder, TypeRegistry};
//!
//! fn main() -> uda::Result<()> {
//!     let registry = TypeRegistry::new(PointerWidth::Eight);
//!     let id = registry.register(
//!         TypeDefinitionBuilder::new("Trace")
//!             .string_field("name")
//!             .pointer_field("samples", DataType::Double)
//!             .build(),
//!     )?;
//!
//!     let mut trace = Instance::new(&registry, id)?;
//!     trace.set("name", "ip")?;
//!     trace.set_pointer("samples", "double", vec![Value::Double(0.5), Value::Double(1.5)])?;
//!
//!     let codec = WireCodec::new(&registry);
//!     let bytes = codec.encode_to_vec(&trace, id)?;
//!     let decoded = codec.decode(&mut bytes.as_slice(), id)?;
//!     assert!(decoded.instance.deep_eq(&trace));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Pipeline (materialize -> act -> return) + SessionContext           |
//! +---------------------------------------------------------------------+
//! |  Action Engine: composite, documentation, calibration, time offset, |
//! |  error model, subset                                                |
//! +---------------------------------------------------------------------+
//! |  Data Block: data, errors, Dims (explicit | analytic), opaque       |
//! |  payload, cache envelope                                            |
//! +---------------------------------------------------------------------+
//! |  Wire Codec: type table + instance stream, primitive arrays         |
//! +---------------------------------------------------------------------+
//! |  Instances on a Heap  |  Allocation Ledger  |  Type Registry        |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeRegistry`] | Append-only table of laid-out compound types |
//! | [`Instance`] | Structure instance plus the heap owning its blocks |
//! | [`WireCodec`] | Encodes and decodes instances over `Read`/`Write` |
//! | [`DataBlock`] | Dimensioned result with errors and opaque payload |
//! | [`ActionEngine`] | Applies range-scoped rules to a Data Block |
//! | [`Pipeline`] | Validates, transforms and caches blocks per request |
//!
//! ## Modules Overview
//!
//! - [`types`] - type registry, layout, schema loader
//! - [`ledger`] - allocation ledger and node arena
//! - [`instance`] - structure instances
//! - [`codec`] - wire codec
//! - [`block`] - Data Block model and cache serialization
//! - [`action`] - action/subsetting engine
//! - [`pipeline`] - request pipeline

/// Action/subsetting engine and action documents.
pub mod action;
/// Data Block model, dimensions, cache envelope.
pub mod block;
/// Typed primitive buffers.
pub mod buffer;
/// Wire codec for instances and primitive arrays.
pub mod codec;
/// Constants and runtime configuration.
pub mod config;
/// Per-request and per-session context.
pub mod context;
/// Crate-level error and response codes.
pub mod error;
/// Structure instances.
pub mod instance;
/// Allocation ledger.
pub mod ledger;
/// Request pipeline.
pub mod pipeline;
/// Run-time type description.
pub mod types;

pub use action::{ActionEngine, ActionError, ActionRule, ActionSet};
pub use block::{DataBlock, DataBlockError, Dim, OpaquePayload};
pub use codec::{DecodeError, EncodeError, WireCodec};
pub use config::UdaConfig;
pub use context::{RequestContext, SessionContext};
pub use error::{Error, ErrorReport, Result};
pub use instance::{Instance, Value};
pub use ledger::AllocationLedger;
pub use pipeline::{BlockProducer, Pipeline, PipelineOutput};
pub use types::{RegistrationError, TypeId, TypeRegistry};

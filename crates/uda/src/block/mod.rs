// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data Block Model.
//!
//! A [`DataBlock`] is the dimensioned result of a request: a primary data
//! buffer, optional measured errors or an [`ErrorModel`], one [`Dim`] per
//! axis and an [`OpaquePayload`]. The block owns all of it; buffers handed
//! to [`DataBlock::set_data`] / [`DataBlock::set_dim`] move in, and
//! [`DataBlock::free`] releases everything once.
//!
//! # Example
//!
//! ```rust
//! use uda::block::{DataBlock, Dim};
//! use uda::buffer::TypedBuffer;
//! use uda::types::DataType;
//!
//! let mut block = DataBlock::with_rank(1);
//! block
//!     .set_data(TypedBuffer::Double(vec![1.0, 2.0, 3.0]), DataType::Double, 3)
//!     .unwrap();
//! let mut time = Dim::explicit(TypedBuffer::Double(vec![0.0, 0.5, 1.0])).with_label("time", "s");
//! assert!(time.compress(1e-12));
//! block.set_dim(0, time).unwrap();
//! block.validate().unwrap();
//!
//! let summary = block.free();
//! assert_eq!(summary.buffers, 1);
//! assert!(block.free().is_empty());
//! ```

mod cache;
mod data_block;
mod dim;
mod error_model;
mod opaque;
mod ragged;

pub use cache::{
    deserialize_block, read_block_file, serialize_block, write_block_file, CacheError,
    EnvelopeHeader,
};
pub use data_block::{DataBlock, DataBlockError, FreeSummary};
pub use dim::{Dim, DimValues, Domain};
pub use error_model::{ErrorModel, ErrorModelKind, GeneratedErrors};
pub use opaque::{OpaquePayload, PayloadRelease};
pub use ragged::{assemble_ragged, RaggedSlice};

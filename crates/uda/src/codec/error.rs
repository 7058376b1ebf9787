// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec errors and soft advisories.

use crate::ledger::NodeId;
use crate::types::TypeId;
use std::io;
use thiserror::Error;

/// Encoding failures.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown type {0}")]
    UnknownType(TypeId),

    #[error("unknown type name '{0}'")]
    UnknownTypeName(String),

    #[error("unsupported type '{0}'")]
    UnsupportedType(String),

    #[error("instance of '{found}' cannot be encoded as '{expected}'")]
    TypeMismatch { expected: String, found: String },

    #[error("field '{field}' expects {expected}, found {found}")]
    ValueMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("'{type_name}' value has no field '{field}'")]
    MissingValue { type_name: String, field: String },

    #[error("field '{field}' points to released block {node}")]
    DanglingPointer { field: String, node: NodeId },

    #[error("count {0} does not fit the wire count")]
    CountTooLarge(usize),

    #[error("nesting deeper than {0}")]
    DepthExceeded(usize),
}

/// Decoding failures. Corrupt input is never interpreted as valid data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    Eof,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("count {count} exceeds limit {limit}")]
    CountOutOfRange { count: u64, limit: usize },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("field '{field}' shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        field: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("bad magic")]
    BadMagic,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid type tag {0}")]
    InvalidTag(u8),

    #[error("invalid UTF-8 in string")]
    Utf8,

    #[error("nesting deeper than {0}")]
    DepthExceeded(usize),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Eof
        } else {
            Self::Io(e)
        }
    }
}

/// Soft, non-fatal findings reported alongside a decoded instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The wire carried a field the local type does not declare; it was skipped.
    ForeignField {
        type_name: String,
        field: String,
        wire_type: String,
    },
    /// A locally declared field was absent on the wire; it was default-initialized.
    MissingField { type_name: String, field: String },
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error and response codes.
//!
//! Every component error converts into [`Error`]. [`Error::code`] gives a
//! stable number for the response envelope:
//!
//! | Range | Component |
//! |---|---|
//! | 100-199 | type registration / schema |
//! | 200-299 | encode |
//! | 300-399 | decode |
//! | 400-499 | data block |
//! | 500-599 | actions |
//! | 600-699 | cache |
//! | 700-799 | configuration |
//! | 800-899 | instances |

use crate::action::ActionError;
use crate::block::{CacheError, DataBlockError};
use crate::codec::{DecodeError, EncodeError};
use crate::config::ConfigError;
use crate::instance::InstanceError;
use crate::types::RegistrationError;
use std::fmt;
use thiserror::Error;

/// Any failure surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[cfg(feature = "loaders")]
    #[error(transparent)]
    Schema(#[from] crate::types::SchemaError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    DataBlock(#[from] DataBlockError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// Convenient alias for crate results.
pub type Result<T> = std::result::Result<T, Error>;

/// Code and message for a response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: u32,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error {
    /// Stable numeric code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Registration(e) => match e {
                RegistrationError::EmptyName => 101,
                RegistrationError::ReservedName { .. } => 102,
                RegistrationError::Unresolved { .. } => 103,
                RegistrationError::UnknownName { .. } => 104,
                RegistrationError::Conflict { .. } => 105,
                RegistrationError::RecursiveField { .. } => 106,
                RegistrationError::AliasCycle { .. } => 107,
                RegistrationError::DuplicateField { .. } => 108,
                RegistrationError::InvalidShape { .. } => 109,
                RegistrationError::TableFull { .. } => 110,
            },
            #[cfg(feature = "loaders")]
            Self::Schema(_) => 150,
            Self::Encode(e) => match e {
                EncodeError::Io(_) => 201,
                EncodeError::UnknownType(_) | EncodeError::UnknownTypeName(_) => 202,
                EncodeError::UnsupportedType(_) => 203,
                EncodeError::TypeMismatch { .. } => 204,
                EncodeError::ValueMismatch { .. } | EncodeError::MissingValue { .. } => 205,
                EncodeError::DanglingPointer { .. } => 206,
                EncodeError::CountTooLarge(_) => 207,
                EncodeError::DepthExceeded(_) => 208,
            },
            Self::Decode(e) => match e {
                DecodeError::Eof => 301,
                DecodeError::Io(_) => 302,
                DecodeError::CountOutOfRange { .. } => 303,
                DecodeError::UnknownType(_) => 304,
                DecodeError::TypeMismatch { .. } => 305,
                DecodeError::ShapeMismatch { .. } => 306,
                DecodeError::BadMagic => 307,
                DecodeError::UnsupportedVersion(_) => 308,
                DecodeError::InvalidTag(_) => 309,
                DecodeError::Utf8 => 310,
                DecodeError::DepthExceeded(_) => 311,
            },
            Self::DataBlock(_) => 400,
            Self::Action(e) => match e {
                ActionError::MalformedBound(_) => 501,
                ActionError::UnknownDimension { .. } => 502,
                ActionError::UnknownFunction(_) => 503,
                ActionError::Document(_) => 504,
                ActionError::InvalidAttribute { .. } => 505,
                ActionError::ZeroFactor => 506,
                ActionError::SignalUnavailable { .. } => 507,
                ActionError::LengthMismatch { .. } => 508,
                ActionError::NoNumericData => 509,
                ActionError::NoTimeDimension => 510,
                ActionError::EmptySubset { .. } => 511,
                ActionError::Member(_) => 512,
                ActionError::Block(_) => 520,
            },
            Self::Cache(e) => match e {
                CacheError::Io(_) => 601,
                CacheError::BadMagic => 602,
                CacheError::UnsupportedVersion(_) => 603,
                CacheError::Checksum { .. } => 604,
                CacheError::Length { .. } => 605,
                CacheError::Encode(_) => 606,
                CacheError::Decode(_) => 607,
                CacheError::Block(_) => 608,
            },
            Self::Config(_) => 700,
            Self::Instance(_) => 800,
        }
    }

    /// Code plus human-readable message.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Non-primitive attachments of a Data Block.

use crate::instance::Instance;
use crate::ledger::FreeReport;
use std::path::PathBuf;

/// Opaque payload variants.
#[derive(Debug, Clone, Default)]
pub enum OpaquePayload {
    #[default]
    None,
    /// XML document text.
    Xml(String),
    /// A structure instance; its blocks are owned by the instance's ledger.
    Structures(Instance),
    /// Reference to a file the block does not own.
    ExternalFile { path: PathBuf, format: String },
}

/// What releasing a payload did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadRelease {
    #[default]
    Nothing,
    /// Bytes of document text dropped.
    Text(usize),
    /// Blocks released through the instance ledger.
    Structures(FreeReport),
    /// Only local metadata dropped; the external resource is untouched.
    Metadata,
}

impl OpaquePayload {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Xml(_) => "xml",
            Self::Structures(_) => "structures",
            Self::ExternalFile { .. } => "file",
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Structures(instance) => Some(instance),
            _ => None,
        }
    }

    /// Release the payload and leave `None` behind.
    pub fn release(&mut self) -> PayloadRelease {
        match std::mem::take(self) {
            Self::None => PayloadRelease::Nothing,
            Self::Xml(text) => PayloadRelease::Text(text.len()),
            Self::Structures(instance) => PayloadRelease::Structures(instance.free()),
            Self::ExternalFile { .. } => PayloadRelease::Metadata,
        }
    }
}

impl PartialEq for OpaquePayload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Xml(a), Self::Xml(b)) => a == b,
            (Self::Structures(a), Self::Structures(b)) => a.deep_eq(b),
            (
                Self::ExternalFile { path: pa, format: fa },
                Self::ExternalFile { path: pb, format: fb },
            ) => pa == pb && fa == fb,
            _ => false,
        }
    }
}

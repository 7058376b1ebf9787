// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Run-time type description.
//!
//! # Features
//!
//! - **DataType**: atomic type table (names, wire tags, sizes, alignment)
//! - **TypeDescriptor**: laid-out compound type (offsets, padding, size)
//! - **TypeRegistry**: append-only, process-wide table with alias/enum resolution
//! - **Schema loader**: declarative YAML/JSON type descriptions
//!
//! # Example
//!
//! ```rust
//! use uda::types::{FieldSpec, PointerWidth, TypeDefinition, TypeRegistry};
//!
//! let registry = TypeRegistry::new(PointerWidth::Eight);
//! let id = registry
//!     .register(TypeDefinition::new(
//!         "Sample",
//!         vec![FieldSpec::new("flag", "char"), FieldSpec::new("value", "double")],
//!     ))
//!     .unwrap();
//!
//! let desc = registry.resolve(id).unwrap();
//! assert_eq!(desc.fields[1].byte_offset, 8);
//! assert_eq!(desc.fields[1].padding_before, 7);
//! assert_eq!(desc.byte_size, 16);
//! ```

mod atomic;
mod builder;
mod descriptor;
pub mod layout;
mod registry;
#[cfg(feature = "loaders")]
mod schema;

pub use atomic::{DataType, PointerWidth};
pub use builder::TypeDefinitionBuilder;
pub use descriptor::{FieldDescriptor, FieldSpec, TypeDefinition, TypeDescriptor, TypeId};
pub use registry::{RegistrationError, ResolvedType, TypeRegistry};
#[cfg(feature = "loaders")]
pub use schema::{SchemaDocument, SchemaError, SchemaLoader};

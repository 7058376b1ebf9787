// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative schema loader (YAML or JSON).
//!
//! Schemas describe compound types as data; layout is computed by the
//! registry, never taken from a compiler.
//!
//! # Example YAML
//!
//! ```yaml
//! aliases:
//!   - { name: real, target: double }
//!   - { name: real_ptr, target: double, pointer: true }
//! enums:
//!   - { name: Shape, variants: [CIRCLE, SQUARE] }
//! types:
//!   - name: Flux
//!     fields:
//!       - { name: label, type: STRING }
//!       - { name: r, type: real, shape: [2] }
//!       - { name: data, type: real_ptr, description: "loop data" }
//!       - { name: shape, type: Shape }
//! ```

use crate::types::{FieldSpec, RegistrationError, TypeDefinition, TypeId, TypeRegistry};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Schema loading failures.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Root schema document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchemaDocument {
    pub aliases: Vec<AliasEntry>,
    pub enums: Vec<EnumEntry>,
    pub types: Vec<TypeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AliasEntry {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub pointer: bool,
}

#[derive(Debug, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypeEntry {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub pointer: bool,
    #[serde(default)]
    pub shape: Vec<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TypeEntry {
    fn definition(&self) -> TypeDefinition {
        TypeDefinition::new(
            self.name.clone(),
            self.fields
                .iter()
                .map(|f| FieldSpec {
                    name: f.name.clone(),
                    type_name: f.type_name.clone(),
                    pointer: f.pointer,
                    shape: f.shape.clone(),
                    description: f.description.clone(),
                })
                .collect(),
        )
    }
}

/// Schema loader.
pub struct SchemaLoader;

impl SchemaLoader {
    pub fn parse_yaml(text: &str) -> Result<SchemaDocument, SchemaError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn parse_json(text: &str) -> Result<SchemaDocument, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a schema file, choosing the format from its extension (default YAML).
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<SchemaDocument, SchemaError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&text),
            _ => Self::parse_yaml(&text),
        }
    }

    /// Register everything a document declares.
    ///
    /// Types may appear in any order; they are registered once their
    /// dependencies are. Returns ids in document order.
    pub fn register(
        registry: &TypeRegistry,
        doc: &SchemaDocument,
    ) -> Result<Vec<TypeId>, SchemaError> {
        for e in &doc.enums {
            registry.register_enum(e.name.clone(), e.variants.clone())?;
        }
        for a in &doc.aliases {
            registry.register_alias(a.name.clone(), a.target.clone(), a.pointer)?;
        }

        let mut pending: Vec<usize> = (0..doc.types.len()).collect();
        let mut ids = vec![None; doc.types.len()];

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for idx in pending {
                match registry.register(doc.types[idx].definition()) {
                    Ok(id) => ids[idx] = Some(id),
                    Err(RegistrationError::Unresolved { .. }) => deferred.push(idx),
                    Err(e) => return Err(e.into()),
                }
            }
            if deferred.len() == before {
                // No progress: surface the first genuinely unresolved name.
                let idx = deferred[0];
                registry.register(doc.types[idx].definition())?;
            }
            pending = deferred;
        }

        log::info!("[schema] registered {} types", ids.len());
        Ok(ids.into_iter().flatten().collect())
    }

    /// Parse and register a YAML schema.
    pub fn register_yaml(registry: &TypeRegistry, text: &str) -> Result<Vec<TypeId>, SchemaError> {
        let doc = Self::parse_yaml(text)?;
        Self::register(registry, &doc)
    }
}

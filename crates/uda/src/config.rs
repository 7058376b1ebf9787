// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration constants and runtime configuration.
//!
//! Centralizes all tunables. Runtime values come from [`UdaConfig`], loaded
//! from YAML and/or overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `UDA_MAX_ELEMENT_COUNT` | `limits.max_element_count` |
//! | `UDA_MAX_STRING_LENGTH` | `limits.max_string_length` |
//! | `UDA_RAGGED_PADDING` | `ragged_padding` (`zero` / `repeat_last`) |
//! | `UDA_POINTER_WIDTH` | `pointer_width` (`4` / `8`) |

use crate::types::PointerWidth;
use serde::Deserialize;
use std::env;
use thiserror::Error;

// =======================================================================
// Sanity ceilings
// =======================================================================

/// Largest element count accepted from a wire count prefix.
pub const DEFAULT_MAX_ELEMENT_COUNT: usize = 1 << 28;

/// Largest string (bytes) accepted from a wire length prefix.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1 << 24;

/// Maximum nesting depth of compound values (encode and decode).
pub const MAX_NESTING_DEPTH: usize = 64;

/// Maximum Data Block rank.
pub const MAX_RANK: usize = 8;

/// Maximum number of compound types in a registry or a wire type table.
pub const MAX_TYPE_TABLE: usize = 4096;

/// Maximum fields per compound type in a wire type table.
pub const MAX_FIELDS_PER_TYPE: usize = 1024;

// =======================================================================
// Wire identifiers
// =======================================================================

/// Instance stream magic.
pub const INSTANCE_MAGIC: [u8; 4] = *b"UDAS";

/// Instance stream version.
pub const INSTANCE_VERSION: u16 = 1;

/// Cached Data Block magic: "UDABLK\0\0".
pub const BLOCK_MAGIC: [u8; 8] = *b"UDABLK\0\0";

/// Cached Data Block format version.
pub const BLOCK_VERSION: u32 = 1;

/// Dimension labels treated as the time axis when no order is declared.
pub const DEFAULT_TIME_LABELS: &[&str] = &["time", "t", "times", "time_base"];

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Wire codec ceilings applied to untrusted counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecLimits {
    pub max_element_count: usize,
    pub max_string_length: usize,
    pub max_depth: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_element_count: DEFAULT_MAX_ELEMENT_COUNT,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// Fill policy for short time slices when assembling ragged data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaggedPadding {
    /// Pad with zero.
    #[default]
    Zero,
    /// Pad with the slice's last valid value.
    RepeatLast,
}

impl RaggedPadding {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zero" | "0" => Some(Self::Zero),
            "repeat_last" | "repeat-last" | "last" => Some(Self::RepeatLast),
            _ => None,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UdaConfig {
    pub limits: CodecLimits,
    pub ragged_padding: RaggedPadding,
    pub pointer_width: PointerWidth,
    pub time_labels: Vec<String>,
}

impl Default for UdaConfig {
    fn default() -> Self {
        Self {
            limits: CodecLimits::default(),
            ragged_padding: RaggedPadding::default(),
            pointer_width: PointerWidth::host(),
            time_labels: DEFAULT_TIME_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UdaConfig {
    /// Parse a YAML configuration document.
    #[cfg(feature = "loaders")]
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a YAML configuration file.
    #[cfg(feature = "loaders")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| env::var(var).ok())
    }

    /// Apply overrides from a variable lookup (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(value) = lookup("UDA_MAX_ELEMENT_COUNT") {
            self.limits.max_element_count = parse_usize("UDA_MAX_ELEMENT_COUNT", &value)?;
        }
        if let Some(value) = lookup("UDA_MAX_STRING_LENGTH") {
            self.limits.max_string_length = parse_usize("UDA_MAX_STRING_LENGTH", &value)?;
        }
        if let Some(value) = lookup("UDA_RAGGED_PADDING") {
            self.ragged_padding =
                RaggedPadding::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    var: "UDA_RAGGED_PADDING",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("UDA_POINTER_WIDTH") {
            self.pointer_width = value
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(|w| PointerWidth::try_from(w).ok())
                .ok_or_else(|| ConfigError::InvalidEnv {
                    var: "UDA_POINTER_WIDTH",
                    value: value.clone(),
                })?;
        }
        Ok(self)
    }
}

fn parse_usize(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = UdaConfig::default();
        assert_eq!(cfg.ragged_padding, RaggedPadding::Zero);
        assert_eq!(cfg.limits.max_depth, MAX_NESTING_DEPTH);
        assert!(cfg.time_labels.iter().any(|l| l == "time"));
    }

    #[test]
    fn test_env_overrides() {
        let cfg = UdaConfig::default()
            .with_overrides(lookup(&[
                ("UDA_MAX_ELEMENT_COUNT", "1000"),
                ("UDA_RAGGED_PADDING", "repeat_last"),
                ("UDA_POINTER_WIDTH", "4"),
            ]))
            .unwrap();
        assert_eq!(cfg.limits.max_element_count, 1000);
        assert_eq!(cfg.ragged_padding, RaggedPadding::RepeatLast);
        assert_eq!(cfg.pointer_width, PointerWidth::Four);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = UdaConfig::default()
            .with_overrides(lookup(&[("UDA_POINTER_WIDTH", "3")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "UDA_POINTER_WIDTH",
                ..
            }
        ));
    }

    #[cfg(feature = "loaders")]
    #[test]
    fn test_yaml_config() {
        let cfg = UdaConfig::from_yaml_str(
            "limits:\n  max_element_count: 64\nragged_padding: repeat_last\npointer_width: 4\n",
        )
        .unwrap();
        assert_eq!(cfg.limits.max_element_count, 64);
        assert_eq!(cfg.limits.max_string_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(cfg.ragged_padding, RaggedPadding::RepeatLast);
        assert_eq!(cfg.pointer_width, PointerWidth::Four);
        assert_eq!(cfg.time_labels.len(), DEFAULT_TIME_LABELS.len());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Statistical error models attached when no measured error exists.

use std::fmt;

/// Error distribution models, with their numeric ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorModelKind {
    /// Symmetric `a + b * |v|`.
    Default = 1,
    /// `a + b * |v|` above, `c + d * |v|` below.
    DefaultAsymmetric = 2,
    /// Gaussian with caller-interpreted parameters. Never synthesizes arrays.
    Gaussian = 3,
}

impl ErrorModelKind {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Default),
            2 => Some(Self::DefaultAsymmetric),
            3 => Some(Self::Gaussian),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "default_asymmetric" | "asymmetric" => Some(Self::DefaultAsymmetric),
            "gaussian" => Some(Self::Gaussian),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::DefaultAsymmetric => "default_asymmetric",
            Self::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for ErrorModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A model and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorModel {
    pub kind: ErrorModelKind,
    pub params: Vec<f64>,
}

/// Error arrays synthesized from a model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedErrors {
    pub high: Vec<f64>,
    /// Present for asymmetric models.
    pub low: Option<Vec<f64>>,
}

impl ErrorModel {
    pub fn new(kind: ErrorModelKind, params: Vec<f64>) -> Self {
        Self { kind, params }
    }

    fn param(&self, i: usize) -> f64 {
        self.params.get(i).copied().unwrap_or(0.0)
    }

    /// Synthesize error arrays for `values`. `None` for models that only
    /// describe the distribution.
    pub fn generate(&self, values: &[f64]) -> Option<GeneratedErrors> {
        let linear = |a: f64, b: f64| -> Vec<f64> { values.iter().map(|v| a + b * v.abs()).collect() };
        match self.kind {
            ErrorModelKind::Default => Some(GeneratedErrors {
                high: linear(self.param(0), self.param(1)),
                low: None,
            }),
            ErrorModelKind::DefaultAsymmetric => Some(GeneratedErrors {
                high: linear(self.param(0), self.param(1)),
                low: Some(linear(self.param(2), self.param(3))),
            }),
            ErrorModelKind::Gaussian => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let model = ErrorModel::new(ErrorModelKind::Default, vec![0.5, 0.1]);
        let errors = model.generate(&[10.0, -20.0]).unwrap();
        assert_eq!(errors.high, vec![1.5, 2.5]);
        assert!(errors.low.is_none());
    }

    #[test]
    fn test_asymmetric_missing_params_are_zero() {
        let model = ErrorModel::new(ErrorModelKind::DefaultAsymmetric, vec![1.0]);
        let errors = model.generate(&[3.0]).unwrap();
        assert_eq!(errors.high, vec![1.0]);
        assert_eq!(errors.low, Some(vec![0.0]));
    }

    #[test]
    fn test_gaussian_is_descriptive_only() {
        let model = ErrorModel::new(ErrorModelKind::Gaussian, vec![0.0, 1.0]);
        assert!(model.generate(&[1.0]).is_none());
        assert_eq!(ErrorModelKind::from_id(model.kind.id()), Some(ErrorModelKind::Gaussian));
    }
}

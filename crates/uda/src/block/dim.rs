// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data Block dimensions.
//!
//! A [`Dim`] holds its coordinate values either explicitly or as a list of
//! affine [`Domain`]s. The enum makes "both populated" unrepresentable; the
//! remaining invariant (`length` agrees with the representation) is checked
//! by [`Dim::validate`].

use super::{DataBlockError, ErrorModel};
use crate::buffer::TypedBuffer;
use crate::types::DataType;

/// Affine run of coordinate values: `start + i * increment`, `i < count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub start: f64,
    pub increment: f64,
    pub count: usize,
}

impl Domain {
    pub fn new(start: f64, increment: f64, count: usize) -> Self {
        Self {
            start,
            increment,
            count,
        }
    }

    /// Value `i` of the run (not bounds checked).
    pub fn value(&self, i: usize) -> f64 {
        self.start + self.increment * i as f64
    }
}

/// Coordinate representation of a dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DimValues {
    /// Not yet populated by the producer.
    #[default]
    Uninitialized,
    /// One value per sample.
    Explicit(TypedBuffer),
    /// Compressed into affine runs.
    Analytic(Vec<Domain>),
}

/// One axis of a Data Block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dim {
    pub(crate) length: usize,
    pub(crate) data_type: DataType,
    pub(crate) values: DimValues,
    pub(crate) error_high: Option<TypedBuffer>,
    pub(crate) error_low: Option<TypedBuffer>,
    pub(crate) label: String,
    pub(crate) units: String,
    pub(crate) error_model: Option<ErrorModel>,
}

impl Dim {
    /// Explicit coordinates; ownership of `values` moves into the dimension.
    pub fn explicit(values: TypedBuffer) -> Self {
        Self {
            length: values.len(),
            data_type: values.data_type(),
            values: DimValues::Explicit(values),
            ..Self::default()
        }
    }

    /// Analytic coordinates of type `data_type`.
    pub fn analytic(data_type: DataType, domains: Vec<Domain>) -> Self {
        Self {
            length: domains.iter().map(|d| d.count).sum(),
            data_type,
            values: DimValues::Analytic(domains),
            ..Self::default()
        }
    }

    /// Pure index axis `0, 1, .., length - 1`.
    pub fn index(length: usize) -> Self {
        let domains = if length == 0 {
            Vec::new()
        } else {
            vec![Domain::new(0.0, 1.0, length)]
        };
        Self::analytic(DataType::Int, domains)
    }

    pub fn with_label(mut self, label: impl Into<String>, units: impl Into<String>) -> Self {
        self.label = label.into();
        self.units = units.into();
        self
    }

    /// Attach measured errors (`low` present means asymmetric).
    pub fn with_errors(mut self, high: TypedBuffer, low: Option<TypedBuffer>) -> Self {
        self.error_high = Some(high);
        self.error_low = low;
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &DimValues {
        &self.values
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn error_high(&self) -> Option<&TypedBuffer> {
        self.error_high.as_ref()
    }

    pub fn error_low(&self) -> Option<&TypedBuffer> {
        self.error_low.as_ref()
    }

    pub fn error_model(&self) -> Option<&ErrorModel> {
        self.error_model.as_ref()
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self.values, DimValues::Analytic(_))
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.values, DimValues::Uninitialized)
    }

    /// Coordinate `i` widened to `f64`.
    pub fn value(&self, i: usize) -> Option<f64> {
        if i >= self.length {
            return None;
        }
        match &self.values {
            DimValues::Uninitialized => None,
            DimValues::Explicit(buf) => buf.get_f64(i),
            DimValues::Analytic(domains) => {
                let mut rest = i;
                for d in domains {
                    if rest < d.count {
                        return Some(d.value(rest));
                    }
                    rest -= d.count;
                }
                None
            }
        }
    }

    /// All coordinates widened to `f64`. `None` for string or unset axes.
    pub fn values_f64(&self) -> Option<Vec<f64>> {
        match &self.values {
            DimValues::Uninitialized => None,
            DimValues::Explicit(buf) => buf.to_f64(),
            DimValues::Analytic(domains) => Some(expand(domains)),
        }
    }

    /// Replace explicit coordinates by affine runs when that is compact.
    ///
    /// Returns `true` if the dimension is analytic afterwards. Runs are kept
    /// when they collapse to a single domain, or when three numbers per
    /// domain are fewer than the explicit values.
    pub fn compress(&mut self, tolerance: f64) -> bool {
        let values = match &self.values {
            DimValues::Analytic(_) => return true,
            DimValues::Explicit(buf) if buf.data_type().is_numeric() => match buf.to_f64() {
                Some(v) => v,
                None => return false,
            },
            _ => return false,
        };
        let domains = affine_runs(&values, tolerance);
        if domains.len() == 1 || 3 * domains.len() < values.len() {
            log::debug!(
                "[block] compressed dim '{}' ({} values -> {} domains)",
                self.label,
                values.len(),
                domains.len()
            );
            self.values = DimValues::Analytic(domains);
            true
        } else {
            false
        }
    }

    /// Expand analytic coordinates into an explicit buffer of `data_type`.
    pub fn decompress(&mut self) -> Result<(), DataBlockError> {
        if let DimValues::Analytic(domains) = &self.values {
            let values = expand(domains);
            let buf = TypedBuffer::from_f64(self.data_type, &values).ok_or(
                DataBlockError::BufferMismatch {
                    expected: self.data_type,
                    found: DataType::Double,
                },
            )?;
            self.values = DimValues::Explicit(buf);
        }
        Ok(())
    }

    /// Keep the first `n` samples. Analytic runs past `n` are dropped and the
    /// last kept run is shortened so the counts sum to exactly `n`.
    pub fn truncate(&mut self, n: usize) {
        if n >= self.length {
            return;
        }
        match &mut self.values {
            DimValues::Uninitialized => {}
            DimValues::Explicit(buf) => *buf = buf.truncated(n),
            DimValues::Analytic(domains) => {
                let mut kept = 0;
                let mut out = Vec::with_capacity(domains.len());
                for d in domains.iter() {
                    if kept == n {
                        break;
                    }
                    let take = d.count.min(n - kept);
                    out.push(Domain::new(d.start, d.increment, take));
                    kept += take;
                }
                *domains = out;
            }
        }
        self.error_high = self.error_high.take().map(|e| e.truncated(n));
        self.error_low = self.error_low.take().map(|e| e.truncated(n));
        self.length = n;
    }

    /// New dimension holding the samples at `indices`, in that order.
    /// Indices past the end are skipped.
    pub fn select(&self, indices: &[usize]) -> Self {
        let kept: Vec<usize> = indices.iter().copied().filter(|&i| i < self.length).collect();
        let indices = kept.as_slice();
        let values = match &self.values {
            DimValues::Uninitialized => DimValues::Uninitialized,
            DimValues::Explicit(buf) => DimValues::Explicit(buf.select(indices)),
            DimValues::Analytic(domains) => {
                let all = expand(domains);
                let picked: Vec<f64> = indices.iter().filter_map(|&i| all.get(i).copied()).collect();
                DimValues::Explicit(
                    TypedBuffer::from_f64(self.data_type, &picked)
                        .unwrap_or(TypedBuffer::Double(picked)),
                )
            }
        };
        let mut dim = Self {
            length: indices.len(),
            data_type: self.data_type,
            values,
            error_high: self.error_high.as_ref().map(|e| e.select(indices)),
            error_low: self.error_low.as_ref().map(|e| e.select(indices)),
            label: self.label.clone(),
            units: self.units.clone(),
            error_model: self.error_model.clone(),
        };
        if self.is_analytic() {
            dim.compress(0.0);
        }
        dim
    }

    /// Check the dimension's internal consistency. `index` is only used for
    /// error reporting.
    pub fn validate(&self, index: usize) -> Result<(), DataBlockError> {
        let held = match &self.values {
            DimValues::Uninitialized => return Err(DataBlockError::UninitializedDim(index)),
            DimValues::Explicit(buf) => buf.len(),
            DimValues::Analytic(domains) => domains.iter().map(|d| d.count).sum(),
        };
        if held != self.length {
            return Err(DataBlockError::DimInvariant {
                index,
                length: self.length,
                held,
            });
        }
        for err in [&self.error_high, &self.error_low].into_iter().flatten() {
            if err.len() != self.length {
                return Err(DataBlockError::ErrorLengthMismatch {
                    expected: self.length,
                    found: err.len(),
                });
            }
        }
        Ok(())
    }

    /// Release every buffer and reset to uninitialized. Returns the number of
    /// buffers released.
    pub fn free(&mut self) -> usize {
        let mut released = 0;
        if !matches!(self.values, DimValues::Uninitialized) {
            released += 1;
        }
        released += usize::from(self.error_high.is_some());
        released += usize::from(self.error_low.is_some());
        *self = Self::default();
        released
    }
}

fn expand(domains: &[Domain]) -> Vec<f64> {
    domains
        .iter()
        .flat_map(|d| (0..d.count).map(move |i| d.value(i)))
        .collect()
}

fn close(expected: f64, actual: f64, tolerance: f64) -> bool {
    (expected - actual).abs() <= tolerance * actual.abs().max(1.0)
}

/// Greedy split of `values` into maximal affine runs.
fn affine_runs(values: &[f64], tolerance: f64) -> Vec<Domain> {
    let mut domains = Vec::new();
    let mut i = 0;
    while i < values.len() {
        if i + 1 == values.len() {
            domains.push(Domain::new(values[i], 0.0, 1));
            break;
        }
        let start = values[i];
        let increment = values[i + 1] - start;
        let mut count = 2;
        while i + count < values.len()
            && close(start + increment * count as f64, values[i + count], tolerance)
        {
            count += 1;
        }
        domains.push(Domain::new(start, increment, count));
        i += count;
    }
    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_compresses_to_one_domain() {
        let mut dim = Dim::explicit(TypedBuffer::Double(vec![0.0, 0.5, 1.0, 1.5]));
        assert!(dim.compress(1e-12));
        assert_eq!(
            dim.values(),
            &DimValues::Analytic(vec![Domain::new(0.0, 0.5, 4)])
        );

        dim.decompress().unwrap();
        let back = dim.values_f64().unwrap();
        for (a, b) in back.iter().zip([0.0, 0.5, 1.0, 1.5]) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_irregular_stays_explicit() {
        let mut dim = Dim::explicit(TypedBuffer::Double(vec![0.0, 1.0, 4.0, 9.0, 16.0]));
        assert!(!dim.compress(1e-9));
        assert!(!dim.is_analytic());
    }

    #[test]
    fn test_truncate_mid_domain() {
        let mut dim = Dim::analytic(
            DataType::Double,
            vec![Domain::new(0.0, 1.0, 10), Domain::new(100.0, 0.1, 10)],
        );
        dim.truncate(13);
        assert_eq!(dim.length(), 13);
        match dim.values() {
            DimValues::Analytic(d) => {
                assert_eq!(d.len(), 2);
                assert_eq!(d[1].count, 3);
                assert_eq!(d.iter().map(|d| d.count).sum::<usize>(), 13);
            }
            other => panic!("unexpected {other:?}"),
        }
        dim.validate(0).unwrap();

        dim.truncate(4);
        assert!(matches!(dim.values(), DimValues::Analytic(d) if d.len() == 1 && d[0].count == 4));
    }

    #[test]
    fn test_index_dim() {
        let dim = Dim::index(5);
        assert_eq!(dim.value(4), Some(4.0));
        assert_eq!(dim.value(5), None);
        dim.validate(0).unwrap();
    }

    #[test]
    fn test_select_keeps_errors() {
        let dim = Dim::explicit(TypedBuffer::Float(vec![1.0, 2.0, 3.0]))
            .with_errors(TypedBuffer::Float(vec![0.1, 0.2, 0.3]), None);
        let picked = dim.select(&[2, 0]);
        assert_eq!(picked.length(), 2);
        assert_eq!(picked.values_f64(), Some(vec![3.0, 1.0]));
        assert_eq!(picked.error_high().map(TypedBuffer::len), Some(2));
    }

    #[test]
    fn test_select_skips_indices_past_the_end() {
        let dim = Dim::index(4);
        let picked = dim.select(&[3, 9, 1]);
        assert_eq!(picked.length(), 2);
        assert_eq!(picked.values_f64(), Some(vec![3.0, 1.0]));
        picked.validate(0).unwrap();

        let dim = Dim::explicit(TypedBuffer::Int(vec![5, 6]))
            .with_errors(TypedBuffer::Int(vec![1, 2]), None);
        let picked = dim.select(&[7, 1]);
        assert_eq!(picked.length(), 1);
        assert_eq!(picked.error_high().map(TypedBuffer::len), Some(1));
        picked.validate(0).unwrap();
    }

    #[test]
    fn test_validate_and_free() {
        let mut dim = Dim::default();
        assert!(matches!(dim.validate(2), Err(DataBlockError::UninitializedDim(2))));

        dim = Dim::explicit(TypedBuffer::Int(vec![1, 2]))
            .with_errors(TypedBuffer::Int(vec![0]), None);
        assert!(matches!(
            dim.validate(0),
            Err(DataBlockError::ErrorLengthMismatch { expected: 2, found: 1 })
        ));
        assert_eq!(dim.free(), 2);
        assert_eq!(dim.free(), 0);
        assert_eq!(dim.length(), 0);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The materialized, dimensioned result of a request.

use super::{Dim, ErrorModel, OpaquePayload, PayloadRelease};
use crate::buffer::TypedBuffer;
use crate::types::DataType;
use thiserror::Error;

/// Data Block consistency failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataBlockError {
    #[error("rank mismatch: block has {rank} dims, got {found}")]
    RankMismatch { rank: usize, found: usize },

    #[error("dimension lengths multiply to {product}, block holds {element_count} elements")]
    ShapeMismatch { element_count: usize, product: usize },

    #[error("product of dimension lengths overflows")]
    ShapeOverflow,

    #[error("dimension {index} out of range for rank {rank}")]
    DimIndexOutOfRange { index: usize, rank: usize },

    #[error("dimension {0} was never populated")]
    UninitializedDim(usize),

    #[error("data buffer holds {found} elements, expected {expected}")]
    DataLength { expected: usize, found: usize },

    #[error("error buffer holds {found} elements, expected {expected}")]
    ErrorLengthMismatch { expected: usize, found: usize },

    #[error("order {order} is not a dimension of a rank {rank} block")]
    InvalidOrder { order: i64, rank: usize },

    #[error("dimension {index} declares length {length} but holds {held} values")]
    DimInvariant {
        index: usize,
        length: usize,
        held: usize,
    },

    #[error("buffer of type {found} where {expected} was expected")]
    BufferMismatch { expected: DataType, found: DataType },
}

/// What a call to [`DataBlock::free`] released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreeSummary {
    /// Data and error buffers of the block itself.
    pub buffers: usize,
    /// Buffers owned by dimensions.
    pub dim_buffers: usize,
    pub payload: PayloadRelease,
}

impl FreeSummary {
    pub fn is_empty(&self) -> bool {
        self.buffers == 0 && self.dim_buffers == 0 && self.payload == PayloadRelease::Nothing
    }
}

/// N-dimensional array with dimensions, errors and an opaque payload.
///
/// Data are stored with dimension 0 varying fastest. `order` is the index of
/// the time axis, or -1.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub(crate) order: i32,
    pub(crate) data_type: DataType,
    pub(crate) element_count: usize,
    pub(crate) data: Option<TypedBuffer>,
    pub(crate) error_high: Option<TypedBuffer>,
    pub(crate) error_low: Option<TypedBuffer>,
    pub(crate) error_model: Option<ErrorModel>,
    pub(crate) dims: Vec<Dim>,
    pub(crate) opaque: OpaquePayload,
    pub(crate) label: String,
    pub(crate) units: String,
    pub(crate) description: String,
}

impl Default for DataBlock {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl DataBlock {
    /// Rank 0, no data, no time axis.
    pub fn new_empty() -> Self {
        Self {
            order: -1,
            data_type: DataType::Unknown,
            element_count: 0,
            data: None,
            error_high: None,
            error_low: None,
            error_model: None,
            dims: Vec::new(),
            opaque: OpaquePayload::None,
            label: String::new(),
            units: String::new(),
            description: String::new(),
        }
    }

    /// Empty block with `rank` uninitialized dimensions.
    pub fn with_rank(rank: usize) -> Self {
        Self {
            dims: vec![Dim::default(); rank],
            ..Self::new_empty()
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn data(&self) -> Option<&TypedBuffer> {
        self.data.as_ref()
    }

    /// Data widened to `f64`.
    pub fn data_f64(&self) -> Option<Vec<f64>> {
        self.data.as_ref().and_then(TypedBuffer::to_f64)
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

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn dim(&self, index: usize) -> Option<&Dim> {
        self.dims.get(index)
    }

    pub fn opaque(&self) -> &OpaquePayload {
        &self.opaque
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Dimension lengths, dimension 0 first.
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(Dim::length).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.dims.is_empty() && self.opaque.is_none()
    }

    /// Take ownership of the primary data.
    pub fn set_data(
        &mut self,
        buffer: TypedBuffer,
        data_type: DataType,
        count: usize,
    ) -> Result<(), DataBlockError> {
        if buffer.data_type() != data_type {
            return Err(DataBlockError::BufferMismatch {
                expected: data_type,
                found: buffer.data_type(),
            });
        }
        if buffer.len() != count {
            return Err(DataBlockError::DataLength {
                expected: count,
                found: buffer.len(),
            });
        }
        self.data_type = data_type;
        self.element_count = count;
        self.data = Some(buffer);
        Ok(())
    }

    /// Take ownership of dimension `index`.
    pub fn set_dim(&mut self, index: usize, dim: Dim) -> Result<(), DataBlockError> {
        let rank = self.rank();
        let slot = self
            .dims
            .get_mut(index)
            .ok_or(DataBlockError::DimIndexOutOfRange { index, rank })?;
        *slot = dim;
        Ok(())
    }

    pub(crate) fn dim_mut(&mut self, index: usize) -> Result<&mut Dim, DataBlockError> {
        let rank = self.rank();
        self.dims
            .get_mut(index)
            .ok_or(DataBlockError::DimIndexOutOfRange { index, rank })
    }

    /// Symmetric measured error, one value per element.
    pub fn set_error(&mut self, buffer: TypedBuffer) -> Result<(), DataBlockError> {
        self.check_error_len(&buffer)?;
        self.error_high = Some(buffer);
        self.error_low = None;
        Ok(())
    }

    /// Asymmetric measured error.
    pub fn set_asymmetric_error(
        &mut self,
        high: TypedBuffer,
        low: TypedBuffer,
    ) -> Result<(), DataBlockError> {
        self.check_error_len(&high)?;
        self.check_error_len(&low)?;
        self.error_high = Some(high);
        self.error_low = Some(low);
        Ok(())
    }

    fn check_error_len(&self, buffer: &TypedBuffer) -> Result<(), DataBlockError> {
        if buffer.len() != self.element_count {
            return Err(DataBlockError::ErrorLengthMismatch {
                expected: self.element_count,
                found: buffer.len(),
            });
        }
        Ok(())
    }

    pub fn set_error_model(&mut self, model: Option<ErrorModel>) {
        self.error_model = model;
    }

    pub fn set_opaque(&mut self, payload: OpaquePayload) {
        self.opaque = payload;
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_units(&mut self, units: impl Into<String>) {
        self.units = units.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Designate dimension `order` as the time axis, or clear it.
    pub fn set_order(&mut self, order: Option<usize>) -> Result<(), DataBlockError> {
        match order {
            None => self.order = -1,
            Some(o) if o < self.rank() => {
                self.order = i32::try_from(o).map_err(|_| DataBlockError::InvalidOrder {
                    order: o as i64,
                    rank: self.rank(),
                })?
            }
            Some(o) => {
                return Err(DataBlockError::InvalidOrder {
                    order: o as i64,
                    rank: self.rank(),
                })
            }
        }
        Ok(())
    }

    /// Locate the time axis. A declared index wins over a label match; with
    /// neither, the current order is kept.
    pub fn identify_order(
        &mut self,
        declared: Option<usize>,
        time_labels: &[String],
    ) -> Result<i32, DataBlockError> {
        if declared.is_some() {
            self.set_order(declared)?;
            return Ok(self.order);
        }
        let found = self.dims.iter().position(|d| {
            let label = d.label.trim();
            time_labels.iter().any(|t| t.eq_ignore_ascii_case(label))
        });
        if let Some(index) = found {
            self.set_order(Some(index))?;
        }
        Ok(self.order)
    }

    /// Check rank, dimension and buffer consistency.
    pub fn validate(&self) -> Result<(), DataBlockError> {
        for (i, dim) in self.dims.iter().enumerate() {
            dim.validate(i)?;
        }
        if !self.dims.is_empty() {
            let product = self
                .dims
                .iter()
                .try_fold(1usize, |acc, d| acc.checked_mul(d.length()))
                .ok_or(DataBlockError::ShapeOverflow)?;
            if product != self.element_count {
                return Err(DataBlockError::ShapeMismatch {
                    element_count: self.element_count,
                    product,
                });
            }
        } else if self.element_count > 1 {
            return Err(DataBlockError::ShapeMismatch {
                element_count: self.element_count,
                product: 1,
            });
        }
        if let Some(data) = &self.data {
            if data.len() != self.element_count {
                return Err(DataBlockError::DataLength {
                    expected: self.element_count,
                    found: data.len(),
                });
            }
        }
        for err in [&self.error_high, &self.error_low].into_iter().flatten() {
            self.check_error_len(err)?;
        }
        if self.order < -1 || (self.order >= 0 && self.order as usize >= self.rank()) {
            return Err(DataBlockError::InvalidOrder {
                order: i64::from(self.order),
                rank: self.rank(),
            });
        }
        Ok(())
    }

    /// Release every buffer, every dimension and the opaque payload, then
    /// reset to an empty block. Calling it again releases nothing.
    pub fn free(&mut self) -> FreeSummary {
        let mut summary = FreeSummary {
            buffers: [&self.data, &self.error_high, &self.error_low]
                .into_iter()
                .filter(|b| b.is_some())
                .count(),
            ..FreeSummary::default()
        };
        for dim in &mut self.dims {
            summary.dim_buffers += dim.free();
        }
        summary.payload = self.opaque.release();
        if !summary.is_empty() {
            log::debug!(
                "[block] freed {} buffers, {} dim buffers, payload {:?}",
                summary.buffers,
                summary.dim_buffers,
                summary.payload
            );
        }
        *self = Self::new_empty();
        summary
    }
}

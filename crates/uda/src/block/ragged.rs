// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rank-2 assembly of time slices with differing lengths.

use super::{DataBlock, DataBlockError, Dim};
use crate::buffer::TypedBuffer;
use crate::config::RaggedPadding;
use crate::types::DataType;

/// One time slice.
#[derive(Debug, Clone, PartialEq)]
pub struct RaggedSlice {
    pub time: f64,
    pub values: Vec<f64>,
}

impl RaggedSlice {
    pub fn new(time: f64, values: Vec<f64>) -> Self {
        Self { time, values }
    }
}

/// Pack `slices` into a `width x slices.len()` block, dimension 0 being the
/// in-slice index and dimension 1 the time axis. Short slices are filled
/// according to `padding`.
pub fn assemble_ragged(
    slices: &[RaggedSlice],
    padding: RaggedPadding,
) -> Result<DataBlock, DataBlockError> {
    let width = slices.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let mut data = Vec::with_capacity(width * slices.len());
    let mut padded = 0usize;
    for slice in slices {
        data.extend_from_slice(&slice.values);
        let missing = width - slice.values.len();
        let fill = match padding {
            RaggedPadding::Zero => 0.0,
            RaggedPadding::RepeatLast => slice.values.last().copied().unwrap_or(0.0),
        };
        data.extend(std::iter::repeat(fill).take(missing));
        padded += missing;
    }
    if padded > 0 {
        log::debug!("[block] ragged assembly padded {padded} samples ({padding:?})");
    }

    let count = data.len();
    let mut block = DataBlock::with_rank(2);
    block.set_data(TypedBuffer::Double(data), DataType::Double, count)?;
    block.set_dim(0, Dim::index(width))?;

    let mut time = Dim::explicit(TypedBuffer::Double(
        slices.iter().map(|s| s.time).collect(),
    ))
    .with_label("time", "s");
    time.compress(1e-9);
    block.set_dim(1, time)?;
    block.set_order(Some(1))?;
    block.validate()?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slices() -> Vec<RaggedSlice> {
        vec![
            RaggedSlice::new(0.0, vec![1.0, 2.0, 3.0]),
            RaggedSlice::new(0.5, vec![4.0]),
            RaggedSlice::new(1.0, vec![5.0, 6.0]),
        ]
    }

    #[test]
    fn test_zero_padding() {
        let block = assemble_ragged(&slices(), RaggedPadding::Zero).unwrap();
        assert_eq!(block.shape(), vec![3, 3]);
        assert_eq!(
            block.data_f64().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 5.0, 6.0, 0.0]
        );
        assert_eq!(block.order(), 1);
        assert!(block.dim(1).unwrap().is_analytic());
    }

    #[test]
    fn test_repeat_last_padding() {
        let block = assemble_ragged(&slices(), RaggedPadding::RepeatLast).unwrap();
        assert_eq!(
            block.data_f64().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 5.0, 6.0, 6.0]
        );
    }

    #[test]
    fn test_no_slices() {
        let block = assemble_ragged(&[], RaggedPadding::Zero).unwrap();
        assert_eq!(block.element_count(), 0);
        assert_eq!(block.shape(), vec![0, 0]);
    }
}

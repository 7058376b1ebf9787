// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subset operations.
//!
//! Grammar of one operation (one per targeted dimension):
//!
//! | Form | Meaning |
//! |---|---|
//! | `*`, `:` | keep the whole dimension |
//! | `<` `<=` `>` `>=` | coordinates compared against the bound |
//! | `==`, `=` | the index whose coordinate is nearest the bound |
//! | `!=` | every index except the nearest |
//! | `[i]` | a single index |
//! | `[a:b]`, `[a:b:s]`, `a:b` | inclusive index range with optional stride |
//!
//! Several operations on the same dimension intersect.

use super::{ActionError, FunctionRegistry, Subset};
use crate::block::{DataBlock, Dim};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "<" | "lt" => Some(Self::Lt),
            "<=" | "le" => Some(Self::Le),
            ">" | "gt" => Some(Self::Gt),
            ">=" | "ge" => Some(Self::Ge),
            "==" | "=" | "eq" => Some(Self::Eq),
            "!=" | "ne" => Some(Self::Ne),
            _ => None,
        }
    }
}

/// A parsed subset operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubsetOp {
    All,
    Compare { op: Comparison, bound: f64 },
    /// Inclusive; `end == None` runs to the last index.
    Range {
        start: usize,
        end: Option<usize>,
        stride: usize,
    },
}

impl SubsetOp {
    /// Parse `op`, taking `bound` for comparisons.
    pub fn parse(op: &str, bound: Option<f64>) -> Result<Self, ActionError> {
        let text = op.trim();
        let malformed = || ActionError::MalformedBound(op.to_string());
        if text.is_empty() || text == "*" || text == ":" {
            return Ok(Self::All);
        }
        if let Some(cmp) = Comparison::parse(&text.to_ascii_lowercase()) {
            let bound = bound.filter(|b| b.is_finite()).ok_or_else(malformed)?;
            return Ok(Self::Compare { op: cmp, bound });
        }

        let inner = match text.strip_prefix('[') {
            Some(rest) => rest.strip_suffix(']').ok_or_else(malformed)?,
            None if text.contains(':') => text,
            None => return Err(malformed()),
        };
        let parts: Vec<&str> = inner.split(':').map(str::trim).collect();
        let index = |s: &str| -> Result<Option<usize>, ActionError> {
            if s.is_empty() || s == "*" {
                Ok(None)
            } else {
                s.parse::<usize>().map(Some).map_err(|_| malformed())
            }
        };
        match parts.as_slice() {
            [single] => {
                let i = index(single)?.ok_or_else(malformed)?;
                Ok(Self::Range {
                    start: i,
                    end: Some(i),
                    stride: 1,
                })
            }
            [a, b] => Ok(Self::Range {
                start: index(a)?.unwrap_or(0),
                end: index(b)?,
                stride: 1,
            }),
            [a, b, s] => {
                let stride = index(s)?.unwrap_or(1);
                if stride == 0 {
                    return Err(malformed());
                }
                Ok(Self::Range {
                    start: index(a)?.unwrap_or(0),
                    end: index(b)?,
                    stride,
                })
            }
            _ => Err(malformed()),
        }
    }

    /// Indices of `dim` selected by this operation, ascending.
    pub fn indices(&self, dim: &Dim) -> Result<Vec<usize>, ActionError> {
        let len = dim.length();
        match *self {
            Self::All => Ok((0..len).collect()),
            Self::Range { start, end, stride } => {
                if len == 0 {
                    return Ok(Vec::new());
                }
                let end = end.map_or(len - 1, |e| e.min(len - 1));
                if start > end {
                    return Ok(Vec::new());
                }
                Ok((start..=end).step_by(stride).collect())
            }
            Self::Compare { op, bound } => {
                let values = dim.values_f64().ok_or(ActionError::NoNumericData)?;
                let nearest = || {
                    values
                        .iter()
                        .enumerate()
                        .min_by(|a, b| (a.1 - bound).abs().total_cmp(&(b.1 - bound).abs()))
                        .map(|(i, _)| i)
                };
                let picked = match op {
                    Comparison::Eq => nearest().into_iter().collect(),
                    Comparison::Ne => {
                        let skip = nearest();
                        (0..len).filter(|&i| Some(i) != skip).collect()
                    }
                    _ => values
                        .iter()
                        .enumerate()
                        .filter(|(_, &v)| match op {
                            Comparison::Lt => v < bound,
                            Comparison::Le => v <= bound,
                            Comparison::Gt => v > bound,
                            Comparison::Ge => v >= bound,
                            Comparison::Eq | Comparison::Ne => false,
                        })
                        .map(|(i, _)| i)
                        .collect(),
                };
                Ok(picked)
            }
        }
    }
}

/// Apply one subset rule to `block` in place.
///
/// Steps: member extraction, index selection, explicit order, reform, then
/// the post-subset function.
pub fn apply_subset(
    block: &mut DataBlock,
    subset: &Subset,
    functions: &FunctionRegistry,
) -> Result<(), ActionError> {
    if let Some(member) = subset.member.as_deref().filter(|m| !m.is_empty()) {
        extract_member(block, member)?;
    }

    if !subset.operations.is_empty() {
        let rank = block.rank();
        let mut selection: Vec<Vec<usize>> =
            block.dims().iter().map(|d| (0..d.length()).collect()).collect();
        for (i, op) in subset.operations.iter().enumerate() {
            let dim_id = subset.dim_id(i);
            let dim = block
                .dim(dim_id)
                .ok_or(ActionError::UnknownDimension { dim: dim_id, rank })?;
            let op = SubsetOp::parse(op, subset.bounds.get(i).copied())?;
            let picked = op.indices(dim)?;
            selection[dim_id].retain(|idx| picked.binary_search(idx).is_ok());
            if selection[dim_id].is_empty() {
                return Err(ActionError::EmptySubset { dim: dim_id });
            }
        }
        *block = gather(block, &selection)?;
    }

    match subset.order {
        Some(o) if o < 0 => block.set_order(None)?,
        Some(o) => block.set_order(Some(o as usize))?,
        None => {}
    }

    if subset.reform {
        reform(block);
    }

    if let Some(call) = subset.function.as_deref().filter(|f| !f.trim().is_empty()) {
        *block = functions.call(call, block)?;
    }
    Ok(())
}

/// Replace the block by an atomic member of its structures payload.
fn extract_member(block: &mut DataBlock, member: &str) -> Result<(), ActionError> {
    let instance = block
        .opaque()
        .as_instance()
        .ok_or_else(|| ActionError::Member("block carries no structures payload".into()))?;
    let buffer = instance
        .member_buffer(member)
        .map_err(|e| ActionError::Member(e.to_string()))?;
    let count = buffer.len();
    let data_type = buffer.data_type();

    let mut out = DataBlock::with_rank(1);
    out.set_data(buffer, data_type, count)?;
    out.set_dim(0, Dim::index(count))?;
    out.set_label(block.label());
    out.set_units(block.units());
    out.set_description(block.description());
    *block = out;
    Ok(())
}

/// New block holding the cross product of per-dimension index lists.
pub(crate) fn gather(block: &DataBlock, selection: &[Vec<usize>]) -> Result<DataBlock, ActionError> {
    let data = block.data().ok_or(ActionError::NoNumericData)?;
    let shape = block.shape();
    let rank = shape.len();

    let mut strides = Vec::with_capacity(rank);
    let mut stride = 1usize;
    for len in &shape {
        strides.push(stride);
        stride *= len;
    }

    let total: usize = selection.iter().map(Vec::len).product();
    let mut source = Vec::with_capacity(total);
    if total > 0 {
        let mut counter = vec![0usize; rank];
        'outer: loop {
            source.push(
                counter
                    .iter()
                    .enumerate()
                    .map(|(d, &c)| selection[d][c] * strides[d])
                    .sum(),
            );
            for d in 0..=rank {
                if d == rank {
                    break 'outer;
                }
                counter[d] += 1;
                if counter[d] < selection[d].len() {
                    break;
                }
                counter[d] = 0;
            }
        }
    }

    let mut out = block.clone();
    out.element_count = source.len();
    out.data = Some(data.select(&source));
    out.error_high = block.error_high().map(|e| e.select(&source));
    out.error_low = block.error_low().map(|e| e.select(&source));
    for (d, indices) in selection.iter().enumerate() {
        if let Some(dim) = block.dim(d) {
            out.set_dim(d, dim.select(indices))?;
        }
    }
    Ok(out)
}

/// Drop dimensions of length 1. The data layout is unchanged.
fn reform(block: &mut DataBlock) {
    let order = usize::try_from(block.order()).ok();
    let mut kept = Vec::with_capacity(block.rank());
    let mut new_order = -1;
    for (i, dim) in std::mem::take(&mut block.dims).into_iter().enumerate() {
        if dim.length() == 1 {
            continue;
        }
        if order == Some(i) {
            new_order = kept.len() as i32;
        }
        kept.push(dim);
    }
    block.dims = kept;
    block.order = new_order;
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named functions applied after a subset.
//!
//! Functions are looked up once by name in a [`FunctionRegistry`]; a call is
//! written `name` or `name(dim)`.

use super::ActionError;
use crate::block::DataBlock;
use crate::buffer::TypedBuffer;
use crate::types::DataType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A transform run on a subsetted block.
pub trait SubsetFunction: Send + Sync {
    /// Produce a new block from `block`. `dim` is the argument of
    /// `name(dim)`, if given.
    fn apply(&self, block: &DataBlock, dim: Option<usize>) -> Result<DataBlock, ActionError>;
}

/// Name -> function table.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn SubsetFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// No functions at all.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// `abs`, `minimum`, `maximum`, `mean`, `sum`, `count`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("abs", Arc::new(Abs));
        registry.register("minimum", Arc::new(Reduce(Reduction::Min)));
        registry.register("maximum", Arc::new(Reduce(Reduction::Max)));
        registry.register("mean", Arc::new(Reduce(Reduction::Mean)));
        registry.register("sum", Arc::new(Reduce(Reduction::Sum)));
        registry.register("count", Arc::new(Reduce(Reduction::Count)));
        registry
    }

    /// Register or replace a function. Names are case-insensitive.
    pub fn register(&mut self, name: &str, function: Arc<dyn SubsetFunction>) {
        self.functions.insert(name.to_ascii_lowercase(), function);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_lowercase())
    }

    /// Split `name(dim)` into its parts.
    pub fn parse_call(call: &str) -> Result<(String, Option<usize>), ActionError> {
        let call = call.trim();
        match call.split_once('(') {
            None => Ok((call.to_ascii_lowercase(), None)),
            Some((name, rest)) => {
                let arg = rest
                    .strip_suffix(')')
                    .ok_or_else(|| ActionError::MalformedBound(call.to_string()))?
                    .trim();
                let dim = if arg.is_empty() {
                    None
                } else {
                    Some(
                        arg.parse::<usize>()
                            .map_err(|_| ActionError::MalformedBound(call.to_string()))?,
                    )
                };
                Ok((name.trim().to_ascii_lowercase(), dim))
            }
        }
    }

    /// Evaluate `call` on `block`.
    pub fn call(&self, call: &str, block: &DataBlock) -> Result<DataBlock, ActionError> {
        let (name, dim) = Self::parse_call(call)?;
        let function = self
            .functions
            .get(&name)
            .ok_or(ActionError::UnknownFunction(name))?;
        function.apply(block, dim)
    }
}

struct Abs;

impl SubsetFunction for Abs {
    fn apply(&self, block: &DataBlock, _dim: Option<usize>) -> Result<DataBlock, ActionError> {
        let values = block.data_f64().ok_or(ActionError::NoNumericData)?;
        let mut out = block.clone();
        let abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        let count = abs.len();
        out.set_data(TypedBuffer::Double(abs), DataType::Double, count)?;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
enum Reduction {
    Min,
    Max,
    Mean,
    Sum,
    Count,
}

impl Reduction {
    fn fold(self, values: impl Iterator<Item = f64>) -> f64 {
        match self {
            Self::Min => values.fold(f64::NAN, f64::min),
            Self::Max => values.fold(f64::NAN, f64::max),
            Self::Sum => values.sum(),
            Self::Count => values.count() as f64,
            Self::Mean => {
                let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            }
        }
    }
}

/// Collapse one dimension. Defaults to the time axis, then dimension 0.
struct Reduce(Reduction);

impl SubsetFunction for Reduce {
    fn apply(&self, block: &DataBlock, dim: Option<usize>) -> Result<DataBlock, ActionError> {
        let rank = block.rank();
        let d = dim
            .or_else(|| usize::try_from(block.order()).ok())
            .unwrap_or(0);
        if d >= rank {
            return Err(ActionError::UnknownDimension { dim: d, rank });
        }
        let values = block.data_f64().ok_or(ActionError::NoNumericData)?;
        let shape = block.shape();
        let len_d = shape[d];
        let stride: usize = shape[..d].iter().product();
        let outer: usize = shape[d + 1..].iter().product();

        let mut reduced = Vec::with_capacity(stride * outer);
        for o in 0..outer {
            for i in 0..stride {
                let base = i + o * stride * len_d;
                reduced.push(
                    self.0
                        .fold((0..len_d).filter_map(|k| values.get(base + k * stride).copied())),
                );
            }
        }

        let mut out = DataBlock::with_rank(rank - 1);
        let count = reduced.len();
        out.set_data(TypedBuffer::Double(reduced), DataType::Double, count)?;
        for (slot, source) in (0..rank).filter(|&i| i != d).enumerate() {
            if let Some(src) = block.dim(source) {
                out.set_dim(slot, src.clone())?;
            }
        }
        out.set_label(block.label());
        out.set_units(block.units());
        out.set_description(block.description());
        let order = block.order();
        out.order = match usize::try_from(order) {
            Ok(o) if o == d => -1,
            Ok(o) if o > d => order - 1,
            _ => order,
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Dim;

    fn block_2x3() -> DataBlock {
        let mut block = DataBlock::with_rank(2);
        block
            .set_data(
                TypedBuffer::Double(vec![1.0, -2.0, 3.0, -4.0, 5.0, -6.0]),
                DataType::Double,
                6,
            )
            .unwrap();
        block.set_dim(0, Dim::index(2)).unwrap();
        block
            .set_dim(1, Dim::index(3).with_label("time", "s"))
            .unwrap();
        block.set_order(Some(1)).unwrap();
        block
    }

    #[test]
    fn test_parse_call() {
        assert_eq!(FunctionRegistry::parse_call("Mean").unwrap(), ("mean".into(), None));
        assert_eq!(
            FunctionRegistry::parse_call("sum(1)").unwrap(),
            ("sum".into(), Some(1))
        );
        assert!(FunctionRegistry::parse_call("sum(x)").is_err());
        assert!(FunctionRegistry::parse_call("sum(1").is_err());
    }

    #[test]
    fn test_abs() {
        let out = FunctionRegistry::with_builtins()
            .call("abs", &block_2x3())
            .unwrap();
        assert_eq!(out.data_f64().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(out.rank(), 2);
    }

    #[test]
    fn test_reduce_over_time_axis() {
        let out = FunctionRegistry::with_builtins()
            .call("sum", &block_2x3())
            .unwrap();
        // columns: (1,-2) (3,-4) (5,-6) summed along time per channel
        assert_eq!(out.data_f64().unwrap(), vec![9.0, -12.0]);
        assert_eq!(out.rank(), 1);
        assert_eq!(out.order(), -1);
        out.validate().unwrap();
    }

    #[test]
    fn test_reduce_over_dim0() {
        let out = FunctionRegistry::with_builtins()
            .call("maximum(0)", &block_2x3())
            .unwrap();
        assert_eq!(out.data_f64().unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(out.order(), 0);
        assert_eq!(out.dim(0).unwrap().label(), "time");
    }

    #[test]
    fn test_unknown_function() {
        let err = FunctionRegistry::with_builtins()
            .call("median", &block_2x3())
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownFunction("median".into()));
        let err = FunctionRegistry::with_builtins()
            .call("mean(4)", &block_2x3())
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownDimension { dim: 4, rank: 2 });
    }
}

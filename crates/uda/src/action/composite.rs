// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Composite signals: data, errors and axes taken from other signals.

use super::{apply_subset, ActionError, Composite, DimComposite, FunctionRegistry};
use crate::block::{DataBlock, Dim};
use crate::buffer::TypedBuffer;
use crate::context::RequestContext;
use std::collections::HashMap;

/// A signal a composite rule needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRequest {
    pub signal: String,
    pub file: Option<String>,
    pub format: Option<String>,
}

/// Materializes other signals for composite rules. Implemented by the
/// backing-store layer.
pub trait SignalSource {
    fn fetch(&self, request: &SignalRequest, ctx: &RequestContext) -> Result<DataBlock, ActionError>;
}

/// Source that has no signals; every composite lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignalSource;

impl SignalSource for NoSignalSource {
    fn fetch(&self, request: &SignalRequest, _ctx: &RequestContext) -> Result<DataBlock, ActionError> {
        Err(ActionError::SignalUnavailable {
            signal: request.signal.clone(),
            reason: "no signal source configured".into(),
        })
    }
}

/// In-memory signals keyed by case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct MapSignalSource {
    signals: HashMap<String, DataBlock>,
}

impl MapSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signal: &str, block: DataBlock) {
        self.signals.insert(signal.trim().to_ascii_lowercase(), block);
    }

    pub fn with(mut self, signal: &str, block: DataBlock) -> Self {
        self.insert(signal, block);
        self
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl SignalSource for MapSignalSource {
    fn fetch(&self, request: &SignalRequest, _ctx: &RequestContext) -> Result<DataBlock, ActionError> {
        self.signals
            .get(&request.signal.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ActionError::SignalUnavailable {
                signal: request.signal.clone(),
                reason: "not found".into(),
            })
    }
}

fn named(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Data of `block` as a buffer of exactly `expected` values.
fn sized_data(block: &DataBlock, expected: usize) -> Result<TypedBuffer, ActionError> {
    let data = block.data().ok_or(ActionError::NoNumericData)?;
    if data.len() != expected {
        return Err(ActionError::LengthMismatch {
            expected,
            found: data.len(),
        });
    }
    Ok(data.clone())
}

struct Fetcher<'a> {
    composite: &'a Composite,
    ctx: &'a RequestContext,
    source: &'a dyn SignalSource,
}

impl Fetcher<'_> {
    fn fetch(&self, signal: &str) -> Result<DataBlock, ActionError> {
        log::debug!("[actions] composite of {} fetching '{}'", self.ctx, signal);
        self.source.fetch(
            &SignalRequest {
                signal: signal.to_string(),
                file: self.composite.file.clone(),
                format: self.composite.format.clone(),
            },
            &self.ctx.for_signal(signal),
        )
    }
}

/// Apply one composite rule to `block` in place.
pub(crate) fn apply_composite(
    block: &mut DataBlock,
    composite: &Composite,
    ctx: &RequestContext,
    source: &dyn SignalSource,
    functions: &FunctionRegistry,
    time_labels: &[String],
) -> Result<(), ActionError> {
    let fetcher = Fetcher {
        composite,
        ctx,
        source,
    };

    if let Some(signal) = named(&composite.data) {
        *block = fetcher.fetch(signal)?;
    }
    if let Some(signal) = named(&composite.error) {
        let errors = sized_data(&fetcher.fetch(signal)?, block.element_count())?;
        block.error_high = Some(errors);
    }
    if let Some(signal) = named(&composite.aserror) {
        let errors = sized_data(&fetcher.fetch(signal)?, block.element_count())?;
        block.error_low = Some(errors);
    }

    for dim in &composite.dimensions {
        replace_dim(block, dim, &fetcher)?;
    }
    for subset in &composite.subsets {
        apply_subset(block, subset, functions)?;
    }

    block.identify_order(composite.order, time_labels)?;
    Ok(())
}

fn replace_dim(
    block: &mut DataBlock,
    spec: &DimComposite,
    fetcher: &Fetcher<'_>,
) -> Result<(), ActionError> {
    let rank = block.rank();
    let current = block
        .dim(spec.to_dim)
        .cloned()
        .ok_or(ActionError::UnknownDimension {
            dim: spec.to_dim,
            rank,
        })?;
    let length = current.length();

    if let Some(signal) = named(&spec.dim_signal) {
        let fetched = fetcher.fetch(signal)?;
        let mut dim = match spec.from_dim {
            Some(from) => fetched
                .dim(from)
                .cloned()
                .ok_or(ActionError::UnknownDimension {
                    dim: from,
                    rank: fetched.rank(),
                })?,
            None => {
                let values = fetched.data().cloned().ok_or(ActionError::NoNumericData)?;
                Dim::explicit(values).with_label(fetched.label(), fetched.units())
            }
        };
        if dim.length() != length {
            return Err(ActionError::LengthMismatch {
                expected: length,
                found: dim.length(),
            });
        }
        if dim.label.is_empty() {
            dim.label = current.label.clone();
            dim.units = current.units.clone();
        }
        block.set_dim(spec.to_dim, dim)?;
    }

    if let Some(signal) = named(&spec.error) {
        let errors = sized_data(&fetcher.fetch(signal)?, length)?;
        block.dim_mut(spec.to_dim)?.error_high = Some(errors);
    }
    if let Some(signal) = named(&spec.aserror) {
        let errors = sized_data(&fetcher.fetch(signal)?, length)?;
        block.dim_mut(spec.to_dim)?.error_low = Some(errors);
    }
    Ok(())
}

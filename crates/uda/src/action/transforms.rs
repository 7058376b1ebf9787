// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Documentation, calibration, time offset and error model transforms.

use super::{ActionError, Calibration, Documentation, ErrorModelRule, TimeOffset, TimeOffsetMethod};
use crate::block::{DataBlock, DataBlockError, Dim, DimValues, Domain, ErrorModel};
use crate::buffer::TypedBuffer;
use crate::types::DataType;

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn dim_of(block: &mut DataBlock, dim: usize) -> Result<&mut Dim, ActionError> {
    let rank = block.rank();
    block
        .dims
        .get_mut(dim)
        .ok_or(ActionError::UnknownDimension { dim, rank })
}

// =======================================================================
// Documentation
// =======================================================================

pub(crate) fn apply_documentation(
    block: &mut DataBlock,
    doc: &Documentation,
    time_labels: &[String],
) -> Result<(), ActionError> {
    if let Some(label) = text(&doc.label) {
        block.set_label(label);
    }
    if let Some(units) = text(&doc.units) {
        block.set_units(units);
    }
    if let Some(description) = text(&doc.description) {
        block.set_description(description);
    }
    for dd in &doc.dimensions {
        let dim = dim_of(block, dd.dim_id)?;
        if let Some(label) = text(&dd.label) {
            dim.label = label.to_string();
        }
        if let Some(units) = text(&dd.units) {
            dim.units = units.to_string();
        }
    }
    block.identify_order(None, time_labels)?;
    Ok(())
}

// =======================================================================
// Calibration
// =======================================================================

/// `v * factor + offset`, or `(v - offset) / factor` when inverted.
fn linear(values: &[f64], factor: f64, offset: f64, invert: bool) -> Result<Vec<f64>, ActionError> {
    if invert {
        if factor == 0.0 {
            return Err(ActionError::ZeroFactor);
        }
        Ok(values.iter().map(|v| (v - offset) / factor).collect())
    } else {
        Ok(values.iter().map(|v| v * factor + offset).collect())
    }
}

/// Errors scale by `|factor|`; the offset does not apply.
fn scale_errors(buffer: &TypedBuffer, factor: f64, invert: bool) -> Result<TypedBuffer, ActionError> {
    let values = buffer.to_f64().ok_or(ActionError::NoNumericData)?;
    Ok(TypedBuffer::Double(linear(&values, factor.abs(), 0.0, invert)?))
}

pub(crate) fn apply_calibration(block: &mut DataBlock, cal: &Calibration) -> Result<(), ActionError> {
    if cal.target.covers_data() {
        let values = block.data_f64().ok_or(ActionError::NoNumericData)?;
        let calibrated = linear(&values, cal.factor, cal.offset, cal.invert)?;
        let count = calibrated.len();
        block.set_data(TypedBuffer::Double(calibrated), DataType::Double, count)?;
    }
    if cal.target.covers_error() && block.error_high.is_some() {
        block.error_high = block
            .error_high
            .as_ref()
            .map(|e| scale_errors(e, cal.factor, cal.invert))
            .transpose()?;
    }
    if cal.target.covers_aserror() && block.error_low.is_some() {
        block.error_low = block
            .error_low
            .as_ref()
            .map(|e| scale_errors(e, cal.factor, cal.invert))
            .transpose()?;
    }
    if let Some(units) = text(&cal.units) {
        block.set_units(units);
    }

    for dc in &cal.dimensions {
        let dim = dim_of(block, dc.dim_id)?;
        calibrate_dim(dim, dc.dim_id, dc.factor, dc.offset, dc.invert)?;
        if let Some(units) = text(&dc.units) {
            dim.units = units.to_string();
        }
    }
    Ok(())
}

/// Analytic runs stay analytic: an affine map of an affine run is affine.
fn calibrate_dim(
    dim: &mut Dim,
    index: usize,
    factor: f64,
    offset: f64,
    invert: bool,
) -> Result<(), ActionError> {
    let values = match &dim.values {
        DimValues::Uninitialized => {
            return Err(DataBlockError::UninitializedDim(index).into());
        }
        DimValues::Analytic(domains) => {
            if invert && factor == 0.0 {
                return Err(ActionError::ZeroFactor);
            }
            let mapped = domains
                .iter()
                .map(|d| {
                    if invert {
                        Domain::new((d.start - offset) / factor, d.increment / factor, d.count)
                    } else {
                        Domain::new(d.start * factor + offset, d.increment * factor, d.count)
                    }
                })
                .collect();
            DimValues::Analytic(mapped)
        }
        DimValues::Explicit(buf) => {
            let raw = buf.to_f64().ok_or(ActionError::NoNumericData)?;
            DimValues::Explicit(TypedBuffer::Double(linear(&raw, factor, offset, invert)?))
        }
    };
    dim.values = values;
    dim.data_type = DataType::Double;
    dim.error_high = dim
        .error_high
        .as_ref()
        .map(|e| scale_errors(e, factor, invert))
        .transpose()?;
    dim.error_low = dim
        .error_low
        .as_ref()
        .map(|e| scale_errors(e, factor, invert))
        .transpose()?;
    Ok(())
}

// =======================================================================
// Time offset
// =======================================================================

pub(crate) fn apply_time_offset(block: &mut DataBlock, rule: &TimeOffset) -> Result<(), ActionError> {
    let order = usize::try_from(block.order()).map_err(|_| ActionError::NoTimeDimension)?;
    let dim = dim_of(block, order)?;
    match rule.method {
        TimeOffsetMethod::Shift => {
            let shifted = match &dim.values {
                DimValues::Uninitialized => {
                    return Err(DataBlockError::UninitializedDim(order).into());
                }
                DimValues::Analytic(domains) => DimValues::Analytic(
                    domains
                        .iter()
                        .map(|d| Domain::new(d.start + rule.offset, d.increment, d.count))
                        .collect(),
                ),
                DimValues::Explicit(buf) => {
                    let raw = buf.to_f64().ok_or(ActionError::NoNumericData)?;
                    DimValues::Explicit(TypedBuffer::Double(
                        raw.iter().map(|t| t + rule.offset).collect(),
                    ))
                }
            };
            dim.values = shifted;
        }
        TimeOffsetMethod::Regenerate => {
            let domains = if dim.length == 0 {
                Vec::new()
            } else {
                vec![Domain::new(rule.offset, rule.interval, dim.length)]
            };
            dim.values = DimValues::Analytic(domains);
        }
    }
    dim.data_type = DataType::Double;
    Ok(())
}

// =======================================================================
// Error model
// =======================================================================

/// Attach the model; synthesize error arrays only where none were measured.
pub(crate) fn apply_error_model(block: &mut DataBlock, rule: &ErrorModelRule) -> Result<(), ActionError> {
    let model = ErrorModel::new(rule.model, rule.params.clone());
    if block.error_high.is_none() {
        if let Some(generated) = block.data_f64().and_then(|v| model.generate(&v)) {
            block.error_high = Some(TypedBuffer::Double(generated.high));
            block.error_low = generated.low.map(TypedBuffer::Double);
        }
    }
    block.set_error_model(Some(model));

    for dm in &rule.dimensions {
        let dim = dim_of(block, dm.dim_id)?;
        let model = ErrorModel::new(dm.model, dm.params.clone());
        if dim.error_high.is_none() {
            if let Some(generated) = dim.values_f64().and_then(|v| model.generate(&v)) {
                dim.error_high = Some(TypedBuffer::Double(generated.high));
                dim.error_low = generated.low.map(TypedBuffer::Double);
            }
        }
        dim.error_model = Some(model);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CalibrationTarget, DimCalibration, DimDocumentation, DimErrorModel};
    use crate::block::ErrorModelKind;

    fn block() -> DataBlock {
        let mut block = DataBlock::with_rank(1);
        block
            .set_data(TypedBuffer::Int(vec![1, 2, 3]), DataType::Int, 3)
            .unwrap();
        block
            .set_dim(
                0,
                Dim::analytic(DataType::Float, vec![Domain::new(0.0, 0.5, 3)]),
            )
            .unwrap();
        block
    }

    #[test]
    fn test_documentation_sets_order_by_label() {
        let mut b = block();
        let doc = Documentation {
            label: Some("Ip".into()),
            units: Some("A".into()),
            dimensions: vec![DimDocumentation {
                dim_id: 0,
                label: Some("Time".into()),
                units: Some("s".into()),
            }],
            ..Documentation::default()
        };
        apply_documentation(&mut b, &doc, &["time".to_string()]).unwrap();
        assert_eq!((b.label(), b.units()), ("Ip", "A"));
        assert_eq!(b.order(), 0);

        let bad = Documentation {
            dimensions: vec![DimDocumentation {
                dim_id: 3,
                ..DimDocumentation::default()
            }],
            ..Documentation::default()
        };
        assert_eq!(
            apply_documentation(&mut b, &bad, &[]),
            Err(ActionError::UnknownDimension { dim: 3, rank: 1 })
        );
    }

    #[test]
    fn test_calibration_promotes_and_scales_errors() {
        let mut b = block();
        b.set_error(TypedBuffer::Int(vec![1, 1, 1])).unwrap();
        let cal = Calibration {
            factor: -2.0,
            offset: 1.0,
            ..Calibration::default()
        };
        apply_calibration(&mut b, &cal).unwrap();
        assert_eq!(b.data_type(), DataType::Double);
        assert_eq!(b.data_f64().unwrap(), vec![-1.0, -3.0, -5.0]);
        assert_eq!(b.error_high().and_then(TypedBuffer::to_f64), Some(vec![2.0, 2.0, 2.0]));
    }

    #[test]
    fn test_calibration_invert_and_target() {
        let mut b = block();
        b.set_error(TypedBuffer::Double(vec![4.0, 4.0, 4.0])).unwrap();
        let cal = Calibration {
            factor: 2.0,
            offset: 1.0,
            invert: true,
            target: CalibrationTarget::Error,
            ..Calibration::default()
        };
        apply_calibration(&mut b, &cal).unwrap();
        assert_eq!(b.data(), Some(&TypedBuffer::Int(vec![1, 2, 3])));
        assert_eq!(b.error_high().and_then(TypedBuffer::to_f64), Some(vec![2.0, 2.0, 2.0]));

        let zero = Calibration {
            factor: 0.0,
            invert: true,
            ..Calibration::default()
        };
        assert_eq!(apply_calibration(&mut b, &zero), Err(ActionError::ZeroFactor));
    }

    #[test]
    fn test_dim_calibration_keeps_analytic() {
        let mut b = block();
        let cal = Calibration {
            target: CalibrationTarget::Error,
            dimensions: vec![DimCalibration {
                dim_id: 0,
                factor: 1000.0,
                offset: 0.0,
                invert: false,
                units: Some("ms".into()),
            }],
            ..Calibration::default()
        };
        apply_calibration(&mut b, &cal).unwrap();
        let dim = b.dim(0).unwrap();
        assert!(dim.is_analytic());
        assert_eq!(dim.values_f64(), Some(vec![0.0, 500.0, 1000.0]));
        assert_eq!(dim.units(), "ms");
    }

    #[test]
    fn test_time_offset() {
        let mut b = block();
        assert_eq!(
            apply_time_offset(&mut b, &TimeOffset::default()),
            Err(ActionError::NoTimeDimension)
        );
        b.set_order(Some(0)).unwrap();
        let shift = TimeOffset {
            offset: 10.0,
            ..TimeOffset::default()
        };
        apply_time_offset(&mut b, &shift).unwrap();
        assert_eq!(b.dim(0).unwrap().values_f64(), Some(vec![10.0, 10.5, 11.0]));

        let regenerate = TimeOffset {
            method: TimeOffsetMethod::Regenerate,
            offset: -1.0,
            interval: 0.25,
        };
        apply_time_offset(&mut b, &regenerate).unwrap();
        assert_eq!(b.dim(0).unwrap().values_f64(), Some(vec![-1.0, -0.75, -0.5]));
        b.validate().unwrap();
    }

    #[test]
    fn test_error_model_keeps_measured_errors() {
        let mut b = block();
        let rule = ErrorModelRule {
            model: ErrorModelKind::Default,
            params: vec![0.5, 0.0],
            dimensions: vec![DimErrorModel {
                dim_id: 0,
                model: ErrorModelKind::Gaussian,
                params: vec![1.0],
            }],
        };
        apply_error_model(&mut b, &rule).unwrap();
        assert_eq!(b.error_high().and_then(TypedBuffer::to_f64), Some(vec![0.5; 3]));
        assert_eq!(b.dim(0).unwrap().error_model().map(|m| m.kind), Some(ErrorModelKind::Gaussian));
        assert!(b.dim(0).unwrap().error_high().is_none());

        let mut measured = block();
        measured.set_error(TypedBuffer::Double(vec![9.0; 3])).unwrap();
        apply_error_model(&mut measured, &rule).unwrap();
        assert_eq!(measured.error_high(), Some(&TypedBuffer::Double(vec![9.0; 3])));
        assert!(measured.error_model().is_some());
    }
}

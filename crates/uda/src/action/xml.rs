// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XML action documents.
//!
//! ```xml
//! <action>
//!   <signal name="ip">
//!     <documentation exp_number_start="1" exp_number_end="1000">
//!       <label>Ip</label><units>A</units>
//!       <dimension dimid="0"><label>time</label><units>s</units></dimension>
//!     </documentation>
//!     <calibration target="data" exp_number_start="50" exp_number_end="200">
//!       <factor>1000</factor><offset scale="milli">5</offset>
//!     </calibration>
//!     <subset operation="&gt;=,*" bound="0.1,0" dimid="0,1" reform="y"/>
//!   </signal>
//! </action>
//! ```
//!
//! Every rule element accepts `id`, `exp_number_start`, `exp_number_end`,
//! `pass_start` and `pass_end`. Scalar settings may be written as an
//! attribute or as a child element. A `<signal>` without `name` applies to
//! every signal.

use super::{
    ActionError, ActionKind, ActionRule, ActionSet, Calibration, CalibrationTarget, Composite,
    DimCalibration, DimComposite, DimDocumentation, DimErrorModel, Documentation,
    ErrorModelRule, RejectedRule, Subset, TimeOffset, TimeOffsetMethod, ValidityRange,
};
use crate::block::ErrorModelKind;
use roxmltree::Node;
use std::str::FromStr;

/// Parse an action document.
///
/// A document that is not well-formed XML, or whose root is not `<action>`,
/// is rejected as a whole. A rule element whose settings do not parse is
/// left out, logged, and listed in [`ActionSet::rejected`]; the other rules
/// still load.
pub fn parse_actions(text: &str) -> Result<ActionSet, ActionError> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| ActionError::Document(format!("failed to parse action XML: {}", e)))?;
    let root = doc.root_element();
    if root.tag_name().name() != "action" {
        return Err(ActionError::Document(format!(
            "root element is <{}>, expected <action>",
            root.tag_name().name()
        )));
    }

    let mut set = ActionSet::new();
    for signal in elements(root) {
        if signal.tag_name().name() != "signal" {
            log::debug!("[actions] ignoring <{}> under <action>", signal.tag_name().name());
            continue;
        }
        let name = signal.attribute("name").unwrap_or("").trim().to_string();
        for node in elements(signal) {
            let element = node.tag_name().name();
            match parse_rule(node, &name) {
                Ok(Some(rule)) => set.push(rule),
                Ok(None) => log::debug!("[actions] ignoring unknown action <{}>", element),
                Err(error) => {
                    log::warn!(
                        "[actions] dropping <{}> of signal '{}': {}",
                        element,
                        name,
                        error
                    );
                    set.reject(RejectedRule {
                        signal: name.clone(),
                        element: element.to_string(),
                        error,
                    });
                }
            }
        }
    }
    log::debug!(
        "[actions] parsed {} rules ({} rejected)",
        set.len(),
        set.rejected().len()
    );
    Ok(set)
}

/// One rule element, or `None` for an element that is not a rule.
fn parse_rule(node: Node<'_, '_>, signal: &str) -> Result<Option<ActionRule>, ActionError> {
    let kind = match node.tag_name().name() {
        "documentation" => ActionKind::Documentation(parse_documentation(node)?),
        "calibration" => ActionKind::Calibration(parse_calibration(node)?),
        "composite" => ActionKind::Composite(parse_composite(node)?),
        "errormodel" => ActionKind::ErrorModel(parse_error_model(node)?),
        "time_offset" => ActionKind::TimeOffset(parse_time_offset(node)?),
        "subset" => ActionKind::Subset(parse_subset(node)?),
        _ => return Ok(None),
    };
    Ok(Some(ActionRule {
        id: parsed(node, "id")?.unwrap_or(0),
        signal: signal.to_string(),
        exp_range: ValidityRange::new(
            parsed(node, "exp_number_start")?,
            parsed(node, "exp_number_end")?,
        ),
        pass_range: ValidityRange::new(parsed(node, "pass_start")?, parsed(node, "pass_end")?),
        kind,
    }))
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

fn invalid(node: Node<'_, '_>, attribute: &str, value: &str) -> ActionError {
    ActionError::InvalidAttribute {
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

/// Attribute `name`, else the text of child element `name`.
fn value(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .map(|v| v.trim().to_string())
        .or_else(|| child(node, name).map(|c| c.text().unwrap_or("").trim().to_string()))
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<Option<T>, ActionError> {
    value(node, name)
        .map(|v| v.parse::<T>().map_err(|_| invalid(node, name, &v)))
        .transpose()
}

fn flag(node: Node<'_, '_>, name: &str) -> Result<bool, ActionError> {
    match value(node, name) {
        None => Ok(false),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "1" => Ok(true),
            "n" | "no" | "false" | "0" => Ok(false),
            _ => Err(invalid(node, name, &v)),
        },
    }
}

fn scale_factor(node: Node<'_, '_>, scale: &str) -> Result<f64, ActionError> {
    match scale.trim().to_ascii_lowercase().as_str() {
        "" => Ok(1.0),
        "milli" => Ok(1e-3),
        "micro" => Ok(1e-6),
        "nano" => Ok(1e-9),
        other => other.parse::<f64>().map_err(|_| invalid(node, "scale", scale)),
    }
}

/// A number written as an attribute, or as a child element carrying an
/// optional `scale` attribute.
fn scaled(node: Node<'_, '_>, name: &str) -> Result<Option<f64>, ActionError> {
    let Some(number) = parsed::<f64>(node, name)? else {
        return Ok(None);
    };
    let scale = match (node.attribute(name), child(node, name)) {
        (None, Some(c)) => scale_factor(c, c.attribute("scale").unwrap_or(""))?,
        _ => 1.0,
    };
    Ok(Some(number * scale))
}

fn dim_id(node: Node<'_, '_>) -> Result<usize, ActionError> {
    parsed(node, "dimid")?.ok_or_else(|| invalid(node, "dimid", ""))
}

fn list<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<Vec<T>, ActionError> {
    match value(node, name) {
        None => Ok(Vec::new()),
        Some(v) => v
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<T>().map_err(|_| invalid(node, name, &v)))
            .collect(),
    }
}

fn dimensions<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(|n| n.tag_name().name() == "dimension")
}

fn parse_documentation(node: Node<'_, '_>) -> Result<Documentation, ActionError> {
    Ok(Documentation {
        label: value(node, "label"),
        units: value(node, "units"),
        description: value(node, "description"),
        dimensions: dimensions(node)
            .map(|d| {
                Ok(DimDocumentation {
                    dim_id: dim_id(d)?,
                    label: value(d, "label"),
                    units: value(d, "units"),
                })
            })
            .collect::<Result<_, ActionError>>()?,
    })
}

fn parse_calibration(node: Node<'_, '_>) -> Result<Calibration, ActionError> {
    let target = match value(node, "target") {
        None => CalibrationTarget::All,
        Some(t) => CalibrationTarget::from_name(&t).ok_or_else(|| invalid(node, "target", &t))?,
    };
    Ok(Calibration {
        factor: scaled(node, "factor")?.unwrap_or(1.0),
        offset: scaled(node, "offset")?.unwrap_or(0.0),
        invert: flag(node, "invert")?,
        target,
        units: value(node, "units"),
        dimensions: dimensions(node)
            .map(|d| {
                Ok(DimCalibration {
                    dim_id: dim_id(d)?,
                    factor: scaled(d, "factor")?.unwrap_or(1.0),
                    offset: scaled(d, "offset")?.unwrap_or(0.0),
                    invert: flag(d, "invert")?,
                    units: value(d, "units"),
                })
            })
            .collect::<Result<_, ActionError>>()?,
    })
}

fn parse_time_offset(node: Node<'_, '_>) -> Result<TimeOffset, ActionError> {
    let method = match parsed::<i32>(node, "method")? {
        None => TimeOffsetMethod::Shift,
        Some(id) => {
            TimeOffsetMethod::from_id(id).ok_or_else(|| invalid(node, "method", &id.to_string()))?
        }
    };
    let scale = scale_factor(node, node.attribute("scale").unwrap_or(""))?;
    let offset = parsed::<f64>(node, "start")?
        .or(parsed::<f64>(node, "value")?)
        .unwrap_or(0.0);
    Ok(TimeOffset {
        method,
        offset: offset * scale,
        interval: parsed(node, "interval")?.unwrap_or(0.0),
    })
}

fn model_kind(node: Node<'_, '_>) -> Result<ErrorModelKind, ActionError> {
    let text = value(node, "model").ok_or_else(|| invalid(node, "model", ""))?;
    text.parse::<i32>()
        .ok()
        .and_then(ErrorModelKind::from_id)
        .or_else(|| ErrorModelKind::from_name(&text))
        .ok_or_else(|| invalid(node, "model", &text))
}

fn parse_error_model(node: Node<'_, '_>) -> Result<ErrorModelRule, ActionError> {
    Ok(ErrorModelRule {
        model: model_kind(node)?,
        params: list(node, "params")?,
        dimensions: dimensions(node)
            .map(|d| {
                Ok(DimErrorModel {
                    dim_id: dim_id(d)?,
                    model: model_kind(d)?,
                    params: list(d, "params")?,
                })
            })
            .collect::<Result<_, ActionError>>()?,
    })
}

fn parse_subset(node: Node<'_, '_>) -> Result<Subset, ActionError> {
    let operations: Vec<String> = value(node, "operation")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    // Bounds stay positional: an empty slot is NaN and only valid for
    // non-comparison operations.
    let bounds = match value(node, "bound") {
        None => Vec::new(),
        Some(v) => v
            .split(',')
            .map(|s| match s.trim() {
                "" => Ok(f64::NAN),
                b => b.parse::<f64>().map_err(|_| invalid(node, "bound", &v)),
            })
            .collect::<Result<_, ActionError>>()?,
    };
    Ok(Subset {
        operations,
        bounds,
        dim_ids: list(node, "dimid")?,
        reform: flag(node, "reform")?,
        member: value(node, "member"),
        function: value(node, "function"),
        order: parsed(node, "order")?,
        signal: value(node, "data"),
    })
}

fn parse_composite(node: Node<'_, '_>) -> Result<Composite, ActionError> {
    let mut composite = Composite {
        data: value(node, "data"),
        error: value(node, "error"),
        aserror: value(node, "aserror"),
        file: value(node, "file"),
        format: value(node, "format"),
        order: parsed(node, "order")?,
        ..Composite::default()
    };
    for c in elements(node) {
        match c.tag_name().name() {
            "composite_dim" => composite.dimensions.push(DimComposite {
                to_dim: parsed(c, "to_dim")?.ok_or_else(|| invalid(c, "to_dim", ""))?,
                from_dim: parsed(c, "from_dim")?,
                dim_signal: value(c, "dim"),
                error: value(c, "error"),
                aserror: value(c, "aserror"),
            }),
            "subset" => composite.subsets.push(parse_subset(c)?),
            _ => {}
        }
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<action>
  <signal name="ip">
    <documentation id="1" exp_number_start="1" exp_number_end="1000">
      <label>Ip</label>
      <units>A</units>
      <dimension dimid="0"><label>time</label><units>s</units></dimension>
    </documentation>
    <calibration id="2" target="data" invert="n" exp_number_start="50" exp_number_end="200">
      <factor>1000</factor>
      <offset scale="milli">5</offset>
    </calibration>
    <time_offset method="0" value="20" scale="milli" pass_start="1"/>
    <errormodel model="default"><params>0.1, 0.02</params>
      <dimension dimid="0" model="3"><params>1</params></dimension>
    </errormodel>
    <subset operation="&gt;=,*" bound="0.1," dimid="0,1" reform="y" function="mean(0)"/>
  </signal>
  <signal>
    <composite data="alt" order="0" file="/data/alt.nc" format="netcdf">
      <composite_dim to_dim="0" dim="t" from_dim="1"/>
      <subset operation="[0:9:3]"/>
    </composite>
  </signal>
</action>"#;

    #[test]
    fn test_parse_full_document() {
        let set = parse_actions(DOC).unwrap();
        assert_eq!(set.len(), 6);
        let rules = set.rules();

        assert_eq!(rules[0].signal, "ip");
        assert_eq!(rules[0].exp_range, ValidityRange::between(1, 1000));
        match &rules[0].kind {
            ActionKind::Documentation(d) => {
                assert_eq!(d.label.as_deref(), Some("Ip"));
                assert_eq!(d.dimensions[0].units.as_deref(), Some("s"));
            }
            other => panic!("unexpected {other:?}"),
        }

        match &rules[1].kind {
            ActionKind::Calibration(c) => {
                assert_eq!(c.factor, 1000.0);
                assert!((c.offset - 0.005).abs() < 1e-12);
                assert_eq!(c.target, CalibrationTarget::Data);
                assert!(!c.invert);
            }
            other => panic!("unexpected {other:?}"),
        }

        match &rules[2].kind {
            ActionKind::TimeOffset(t) => assert!((t.offset - 0.02).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rules[2].pass_range, ValidityRange::new(Some(1), None));

        match &rules[3].kind {
            ActionKind::ErrorModel(e) => {
                assert_eq!(e.model, ErrorModelKind::Default);
                assert_eq!(e.params, vec![0.1, 0.02]);
                assert_eq!(e.dimensions[0].model, ErrorModelKind::Gaussian);
            }
            other => panic!("unexpected {other:?}"),
        }

        match &rules[4].kind {
            ActionKind::Subset(s) => {
                assert_eq!(s.operations, vec![">=", "*"]);
                assert_eq!(s.bounds[0], 0.1);
                assert!(s.bounds[1].is_nan());
                assert_eq!(s.dim_ids, vec![0, 1]);
                assert!(s.reform);
                assert_eq!(s.function.as_deref(), Some("mean(0)"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(rules[5].signal, "");
        match &rules[5].kind {
            ActionKind::Composite(c) => {
                assert_eq!(c.data.as_deref(), Some("alt"));
                assert_eq!(c.order, Some(0));
                assert_eq!(c.dimensions[0].from_dim, Some(1));
                assert_eq!(c.dimensions[0].dim_signal.as_deref(), Some("t"));
                assert_eq!(c.subsets.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document_aborts() {
        assert!(matches!(
            parse_actions("<action><signal>"),
            Err(ActionError::Document(_))
        ));
        assert!(matches!(
            parse_actions("<actions/>"),
            Err(ActionError::Document(_))
        ));
    }

    #[test]
    fn test_unparsable_rule_is_dropped_alone() {
        let set = parse_actions(
            r#"<action><signal name="ip">
                 <calibration id="1"><factor>2</factor></calibration>
                 <subset id="2" operation="&gt;" bound="abc" dimid="0"/>
                 <calibration id="3"><factor>ten</factor></calibration>
                 <subset id="4" reform="maybe"/>
                 <documentation id="x"><label>Ip</label></documentation>
                 <documentation id="5"><label>Ip</label></documentation>
               </signal></action>"#,
        )
        .unwrap();

        let ids: Vec<i32> = set.rules().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 5]);

        let rejected: Vec<(&str, &str)> = set
            .rejected()
            .iter()
            .map(|r| match &r.error {
                ActionError::InvalidAttribute { attribute, .. } => {
                    (r.element.as_str(), attribute.as_str())
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            rejected,
            vec![
                ("subset", "bound"),
                ("calibration", "factor"),
                ("subset", "reform"),
                ("documentation", "id"),
            ]
        );
        assert!(set.rejected().iter().all(|r| r.signal == "ip"));
    }

    #[test]
    fn test_empty_action_document() {
        assert!(parse_actions("<action/>").unwrap().is_empty());
    }
}

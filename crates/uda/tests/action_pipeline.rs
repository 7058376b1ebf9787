// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Action documents driven through the request pipeline.
//
// A small in-memory "archive" stands in for the backing store: signals are
// produced per request, rules come from an XML document, and the pipeline
// returns the transformed block plus the per-rule report.

#![cfg(feature = "loaders")]
#![allow(clippy::float_cmp)]
#![allow(clippy::missing_panics_doc)]

use uda::action::{ActionCategory, ActionEngine, ActionError};
use uda::block::{DataBlock, Dim, ErrorModelKind};
use uda::buffer::TypedBuffer;
use uda::types::{DataType, PointerWidth};
use uda::{Pipeline, RequestContext, SessionContext, TypeRegistry, UdaConfig};

const ACTIONS: &str = r#"<?xml version="1.0"?>
<action>
  <signal name="ip">
    <documentation id="1" exp_number_start="1" exp_number_end="1000">
      <label>Ip</label>
      <units>A</units>
      <description>Plasma current</description>
    </documentation>
    <calibration id="2" target="data" exp_number_start="50" exp_number_end="200">
      <factor>1000</factor>
    </calibration>
    <subset id="3" operation="&gt;=" bound="0.15" dimid="0"/>
  </signal>
  <signal name="ne">
    <errormodel id="4" model="default" params="0.5, 0.0"/>
  </signal>
  <signal name="bad">
    <subset id="5" operation="&gt;" dimid="0"/>
    <documentation id="6"><label>still documented</label></documentation>
  </signal>
  <signal name="ipc">
    <composite id="7" data="ip" error="ip_err" order="0"/>
  </signal>
</action>"#;

fn series(values: Vec<f64>) -> DataBlock {
    let n = values.len();
    let times: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
    let mut block = DataBlock::with_rank(1);
    block
        .set_data(TypedBuffer::Double(values), DataType::Double, n)
        .unwrap();
    block
        .set_dim(0, Dim::explicit(TypedBuffer::Double(times)).with_label("time", "s"))
        .unwrap();
    block.set_order(Some(0)).unwrap();
    block
}

fn archive(request: &RequestContext) -> uda::Result<DataBlock> {
    match request.signal.to_ascii_lowercase().as_str() {
        "ip" | "bad" | "ipc" => Ok(series(vec![1.0, 2.0, 3.0, 4.0])),
        "ip_err" => Ok(series(vec![0.1, 0.1, 0.2, 0.2])),
        "ne" => Ok(series(vec![2.0, 4.0, 6.0])),
        other => Err(ActionError::SignalUnavailable {
            signal: other.to_string(),
            reason: "not archived".into(),
        }
        .into()),
    }
}

fn pipeline(registry: &TypeRegistry) -> Pipeline<'_> {
    let config = UdaConfig::default();
    let mut engine = ActionEngine::from_config(&config);
    assert_eq!(engine.load_xml(ACTIONS).unwrap(), 7);
    Pipeline::new(registry, config).with_engine(engine)
}

#[test]
fn calibration_is_scoped_to_its_shot_range() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let inside = pipeline
        .fetch(&mut session, &RequestContext::new("ip", 100, 0), &archive)
        .unwrap();
    assert_eq!(inside.block.data_f64().unwrap(), vec![3000.0, 4000.0]);
    assert_eq!(inside.block.dims()[0].values_f64().unwrap(), vec![0.2, 0.30000000000000004]);
    assert_eq!(inside.block.label(), "Ip");
    assert_eq!(inside.block.units(), "A");
    assert_eq!(inside.block.description(), "Plasma current");
    let categories: Vec<ActionCategory> = inside.report.applied.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            ActionCategory::Documentation,
            ActionCategory::Calibration,
            ActionCategory::Subset
        ]
    );

    let outside = pipeline
        .fetch(&mut session, &RequestContext::new("IP", 500, 0), &archive)
        .unwrap();
    assert_eq!(outside.block.data_f64().unwrap(), vec![3.0, 4.0]);
    assert_eq!(outside.block.label(), "Ip");

    let undocumented = pipeline
        .fetch(&mut session, &RequestContext::new("ip", 5000, 0), &archive)
        .unwrap();
    assert_eq!(undocumented.block.label(), "");

    assert_eq!(session.request_count(), 3);
    assert_eq!(session.last_exp_number(), Some(5000));
    assert_eq!(session.failed_count(), 0);
}

#[test]
fn error_model_generates_missing_errors() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let out = pipeline
        .fetch(&mut session, &RequestContext::new("ne", 1, 0), &archive)
        .unwrap();
    let model = out.block.error_model().unwrap();
    assert_eq!(model.kind, ErrorModelKind::Default);
    assert_eq!(model.params, vec![0.5, 0.0]);
    assert_eq!(
        out.block.error_high(),
        Some(&TypedBuffer::Double(vec![0.5, 0.5, 0.5]))
    );
    assert_eq!(out.block.data_f64().unwrap(), vec![2.0, 4.0, 6.0]);
}

#[test]
fn failed_rule_is_rolled_back_and_reported() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let out = pipeline
        .fetch(&mut session, &RequestContext::new("bad", 1, 0), &archive)
        .unwrap();
    assert_eq!(out.report.failures.len(), 1);
    let failure = &out.report.failures[0];
    assert_eq!(failure.id, 5);
    assert_eq!(failure.category, ActionCategory::Subset);
    assert!(matches!(failure.error, ActionError::MalformedBound(_)));

    // The documentation rule still applied; the data is untouched.
    assert_eq!(out.block.label(), "still documented");
    assert_eq!(out.block.data_f64().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(session.failed_count(), 0);
}

#[test]
fn composite_pulls_data_and_errors_from_the_archive() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let out = pipeline
        .fetch(&mut session, &RequestContext::new("ipc", 1, 0), &archive)
        .unwrap();
    assert!(out.report.failures.is_empty());
    assert_eq!(out.block.data_f64().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(
        out.block.error_high(),
        Some(&TypedBuffer::Double(vec![0.1, 0.1, 0.2, 0.2]))
    );
    assert_eq!(out.block.order(), 0);
}

#[test]
fn unknown_signal_fails_the_request() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let err = pipeline
        .fetch(&mut session, &RequestContext::new("te", 1, 0), &archive)
        .unwrap_err();
    assert_eq!(err.code(), 507);
    assert_eq!(session.failed_count(), 1);
}

#[test]
fn processed_blocks_survive_the_cache() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let pipeline = pipeline(&registry);
    let mut session = SessionContext::new();

    let out = pipeline
        .fetch(&mut session, &RequestContext::new("ip", 100, 0), &archive)
        .unwrap();
    let bytes = pipeline.to_cache(&out.block).unwrap();
    assert_eq!(pipeline.from_cache(&bytes).unwrap(), out.block);
}

#[test]
fn unparsable_rule_leaves_the_rest_of_the_document() {
    let registry = TypeRegistry::new(PointerWidth::Eight);
    let config = UdaConfig::default();
    let mut engine = ActionEngine::from_config(&config);
    let loaded = engine
        .load_xml(
            r#"<action><signal name="ip">
                 <calibration id="1" target="data"><factor>10</factor></calibration>
                 <subset id="2" operation="&gt;=" bound="abc" dimid="0"/>
               </signal></action>"#,
        )
        .unwrap();
    assert_eq!(loaded, 1);
    let rejected = engine.actions().unwrap().rejected();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].element, "subset");

    let pipeline = Pipeline::new(&registry, config).with_engine(engine);
    let mut session = SessionContext::new();
    let out = pipeline
        .fetch(&mut session, &RequestContext::new("ip", 1, 0), &archive)
        .unwrap();
    assert!(out.report.failures.is_empty());
    assert_eq!(out.block.data_f64().unwrap(), vec![10.0, 20.0, 30.0, 40.0]);
}

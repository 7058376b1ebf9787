// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule selection and application.

use super::composite::apply_composite;
use super::subset::apply_subset;
use super::transforms::{apply_calibration, apply_documentation, apply_error_model, apply_time_offset};
use super::{
    ActionCategory, ActionError, ActionKind, ActionRule, ActionSet, Documentation,
    FunctionRegistry, SignalSource,
};
use crate::block::DataBlock;
use crate::config::{UdaConfig, DEFAULT_TIME_LABELS};
use crate::context::RequestContext;

/// Where a request is in the action lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NoActionsLoaded,
    ActionsLoaded,
    Evaluating { exp_number: i32, pass: i32 },
    Applying(ActionCategory),
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedRule {
    pub id: i32,
    pub category: ActionCategory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub id: i32,
    pub category: ActionCategory,
    pub error: ActionError,
}

/// What one call to [`ActionEngine::apply`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionReport {
    pub applied: Vec<AppliedRule>,
    /// Rules that failed and were rolled back.
    pub failures: Vec<RuleFailure>,
    /// States visited, in order.
    pub states: Vec<EngineState>,
}

impl ActionReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.failures.is_empty()
    }
}

/// The transformed block and its report. Always carries a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub block: DataBlock,
    pub report: ActionReport,
}

/// Applies loaded rules to materialized blocks. Stateless per call.
#[derive(Debug, Clone)]
pub struct ActionEngine {
    actions: Option<ActionSet>,
    functions: FunctionRegistry,
    time_labels: Vec<String>,
}

impl Default for ActionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionEngine {
    pub fn new() -> Self {
        Self {
            actions: None,
            functions: FunctionRegistry::with_builtins(),
            time_labels: DEFAULT_TIME_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &UdaConfig) -> Self {
        Self {
            time_labels: config.time_labels.clone(),
            ..Self::new()
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Add rules after any already loaded.
    pub fn load(&mut self, rules: ActionSet) {
        log::debug!("[actions] loaded {} rules", rules.len());
        match &mut self.actions {
            Some(existing) => existing.extend(rules),
            None => self.actions = Some(rules),
        }
    }

    /// Parse and load an action document. A malformed document loads
    /// nothing.
    #[cfg(feature = "loaders")]
    pub fn load_xml(&mut self, text: &str) -> Result<usize, ActionError> {
        let rules = super::parse_actions(text)?;
        let count = rules.len();
        self.load(rules);
        Ok(count)
    }

    pub fn actions(&self) -> Option<&ActionSet> {
        self.actions.as_ref()
    }

    pub fn state(&self) -> EngineState {
        match self.actions {
            Some(_) => EngineState::ActionsLoaded,
            None => EngineState::NoActionsLoaded,
        }
    }

    /// Run every rule matching `ctx` over `block`.
    pub fn apply(
        &self,
        ctx: &RequestContext,
        block: DataBlock,
        source: &dyn SignalSource,
    ) -> ActionOutcome {
        let mut block = block;
        let mut report = ActionReport {
            states: vec![self.state()],
            ..ActionReport::default()
        };

        if let Some(actions) = &self.actions {
            report.states.push(EngineState::Evaluating {
                exp_number: ctx.exp_number,
                pass: ctx.pass,
            });
            let selected = actions.select(&ctx.signal, ctx.exp_number, ctx.pass);
            for category in ActionCategory::ORDER {
                let rules: Vec<&ActionRule> = selected
                    .iter()
                    .copied()
                    .filter(|r| r.category() == category)
                    .collect();
                let Some(last) = rules.last() else {
                    continue;
                };
                report.states.push(EngineState::Applying(category));

                match category {
                    ActionCategory::Documentation => {
                        let mut merged = Documentation::default();
                        for rule in &rules {
                            if let ActionKind::Documentation(doc) = &rule.kind {
                                merged.merge(doc);
                            }
                        }
                        self.attempt(ctx, last.id, category, &mut block, &mut report, |b| {
                            apply_documentation(b, &merged, &self.time_labels)
                        });
                    }
                    c if c.composes() => {
                        for rule in &rules {
                            self.attempt(ctx, rule.id, category, &mut block, &mut report, |b| {
                                self.execute(&rule.kind, b, ctx, source)
                            });
                        }
                    }
                    _ => {
                        if rules.len() > 1 {
                            log::debug!(
                                "[actions] {} {}: rule {} overrides {} earlier",
                                ctx,
                                category,
                                last.id,
                                rules.len() - 1
                            );
                        }
                        self.attempt(ctx, last.id, category, &mut block, &mut report, |b| {
                            self.execute(&last.kind, b, ctx, source)
                        });
                    }
                }
            }
        }

        report.states.push(EngineState::Applied);
        ActionOutcome { block, report }
    }

    fn execute(
        &self,
        kind: &ActionKind,
        block: &mut DataBlock,
        ctx: &RequestContext,
        source: &dyn SignalSource,
    ) -> Result<(), ActionError> {
        match kind {
            ActionKind::Composite(c) => {
                apply_composite(block, c, ctx, source, &self.functions, &self.time_labels)
            }
            ActionKind::Documentation(d) => apply_documentation(block, d, &self.time_labels),
            ActionKind::Calibration(c) => apply_calibration(block, c),
            ActionKind::TimeOffset(t) => apply_time_offset(block, t),
            ActionKind::ErrorModel(e) => apply_error_model(block, e),
            ActionKind::Subset(s) => apply_subset(block, s, &self.functions),
        }
    }

    /// Run `f` on a copy of `block`; keep the copy only if `f` succeeds and
    /// the result is consistent.
    fn attempt<F>(
        &self,
        ctx: &RequestContext,
        id: i32,
        category: ActionCategory,
        block: &mut DataBlock,
        report: &mut ActionReport,
        f: F,
    ) where
        F: FnOnce(&mut DataBlock) -> Result<(), ActionError>,
    {
        let mut candidate = block.clone();
        let result = f(&mut candidate).and_then(|()| candidate.validate().map_err(ActionError::from));
        match result {
            Ok(()) => {
                *block = candidate;
                report.applied.push(AppliedRule { id, category });
            }
            Err(error) => {
                log::warn!(
                    "[actions] {} rule {} on {} failed, block left unchanged: {}",
                    category,
                    id,
                    ctx,
                    error
                );
                report.failures.push(RuleFailure {
                    id,
                    category,
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{
        Calibration, CalibrationTarget, Composite, MapSignalSource, NoSignalSource, Subset,
        ValidityRange,
    };
    use crate::block::Dim;
    use crate::buffer::TypedBuffer;
    use crate::types::DataType;

    fn raw(values: Vec<f64>) -> DataBlock {
        let n = values.len();
        let mut block = DataBlock::with_rank(1);
        block
            .set_data(TypedBuffer::Double(values), DataType::Double, n)
            .unwrap();
        block.set_dim(0, Dim::index(n)).unwrap();
        block
    }

    fn engine(rules: Vec<ActionRule>) -> ActionEngine {
        let mut engine = ActionEngine::new();
        engine.load(rules.into_iter().collect());
        engine
    }

    fn calibration(factor: f64) -> ActionKind {
        ActionKind::Calibration(Calibration::scale(factor, 0.0))
    }

    #[test]
    fn test_end_to_end_scenario() {
        let engine = engine(vec![
            ActionRule::new(
                "X",
                ActionKind::Documentation(Documentation {
                    label: Some("Ip".into()),
                    units: Some("A".into()),
                    ..Documentation::default()
                }),
            )
            .with_exp_range(ValidityRange::between(1, 1000)),
            ActionRule::new(
                "X",
                ActionKind::Calibration(Calibration {
                    factor: 1000.0,
                    offset: 0.0,
                    target: CalibrationTarget::Data,
                    ..Calibration::default()
                }),
            )
            .with_exp_range(ValidityRange::between(50, 200)),
        ]);

        let out = engine.apply(
            &RequestContext::new("X", 100, 0),
            raw(vec![1.0, 2.0, 3.0]),
            &NoSignalSource,
        );
        assert_eq!(out.block.data_f64().unwrap(), vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(out.block.label(), "Ip");
        assert_eq!(out.block.units(), "A");
        assert_eq!(out.report.applied.len(), 2);
        assert!(out.report.failures.is_empty());

        // outside the calibration range only the documentation applies
        let out = engine.apply(
            &RequestContext::new("X", 500, 0),
            raw(vec![1.0, 2.0, 3.0]),
            &NoSignalSource,
        );
        assert_eq!(out.block.data_f64().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(out.block.label(), "Ip");
    }

    #[test]
    fn test_calibration_last_wins() {
        let engine = engine(vec![
            ActionRule::new("x", calibration(2.0)).with_id(1),
            ActionRule::new("x", calibration(3.0)).with_id(2),
        ]);
        let out = engine.apply(
            &RequestContext::new("x", 100, 0),
            raw(vec![1.0, 2.0]),
            &NoSignalSource,
        );
        assert_eq!(out.block.data_f64().unwrap(), vec![3.0, 6.0]);
        assert_eq!(
            out.report.applied,
            vec![AppliedRule {
                id: 2,
                category: ActionCategory::Calibration
            }]
        );
    }

    #[test]
    fn test_composite_then_subset_compose() {
        let source = MapSignalSource::new().with("y", raw(vec![10.0, 20.0, 30.0, 40.0]));
        let engine = engine(vec![
            ActionRule::new("x", ActionKind::Subset(Subset::new(&["[1:2]"], &[]))),
            ActionRule::new(
                "x",
                ActionKind::Composite(Composite {
                    data: Some("y".into()),
                    ..Composite::default()
                }),
            ),
        ]);
        let out = engine.apply(&RequestContext::new("x", 1, 0), raw(vec![1.0, 2.0]), &source);
        assert_eq!(out.block.data_f64().unwrap(), vec![20.0, 30.0]);
    }

    #[test]
    fn test_failing_rule_is_rolled_back() {
        let engine = engine(vec![
            ActionRule::new("x", calibration(10.0)).with_id(1),
            ActionRule::new("x", ActionKind::Subset(Subset::new(&["<"], &[]))).with_id(7),
            ActionRule::new("x", ActionKind::Subset(Subset::new(&["[0]"], &[]))).with_id(8),
        ]);
        let out = engine.apply(
            &RequestContext::new("x", 1, 0),
            raw(vec![1.0, 2.0]),
            &NoSignalSource,
        );
        assert_eq!(out.block.data_f64().unwrap(), vec![10.0]);
        assert_eq!(out.report.failures.len(), 1);
        assert_eq!(out.report.failures[0].id, 7);
        assert!(matches!(
            out.report.failures[0].error,
            ActionError::MalformedBound(_)
        ));
    }

    #[test]
    fn test_state_sequence() {
        let out = ActionEngine::new().apply(
            &RequestContext::new("x", 1, 0),
            raw(vec![1.0]),
            &NoSignalSource,
        );
        assert_eq!(
            out.report.states,
            vec![EngineState::NoActionsLoaded, EngineState::Applied]
        );
        assert!(out.report.is_noop());

        let engine = engine(vec![
            ActionRule::new("x", calibration(2.0)).with_pass_range(ValidityRange::between(1, 3)),
        ]);
        let out = engine.apply(&RequestContext::new("x", 1, 0), raw(vec![1.0]), &NoSignalSource);
        assert!(out.report.is_noop());
        let out = engine.apply(&RequestContext::new("x", 1, 2), raw(vec![1.0]), &NoSignalSource);
        assert_eq!(
            out.report.states,
            vec![
                EngineState::ActionsLoaded,
                EngineState::Evaluating {
                    exp_number: 1,
                    pass: 2
                },
                EngineState::Applying(ActionCategory::Calibration),
                EngineState::Applied,
            ]
        );
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Action rules and rule sets.

use super::ActionError;
use crate::block::ErrorModelKind;
use std::fmt;

/// Inclusive validity range. An unset bound admits any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidityRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl ValidityRange {
    /// Admits everything.
    pub const OPEN: Self = Self {
        start: None,
        end: None,
    };

    pub fn new(start: Option<i32>, end: Option<i32>) -> Self {
        Self { start, end }
    }

    /// Closed range `[start, end]`.
    pub fn between(start: i32, end: i32) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn contains(&self, value: i32) -> bool {
        self.start.map_or(true, |s| value >= s) && self.end.map_or(true, |e| value <= e)
    }
}

impl fmt::Display for ValidityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (None, None) => write!(f, "*"),
            (Some(s), None) => write!(f, "{}..", s),
            (None, Some(e)) => write!(f, "..{}", e),
            (Some(s), Some(e)) => write!(f, "{}..{}", s, e),
        }
    }
}

/// Rule categories, in the order the engine applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionCategory {
    Composite,
    Documentation,
    Calibration,
    TimeOffset,
    ErrorModel,
    Subset,
}

impl ActionCategory {
    pub const ORDER: [Self; 6] = [
        Self::Composite,
        Self::Documentation,
        Self::Calibration,
        Self::TimeOffset,
        Self::ErrorModel,
        Self::Subset,
    ];

    /// Composing categories apply every matching rule in turn; the others
    /// apply only the last matching rule.
    pub fn composes(self) -> bool {
        matches!(self, Self::Composite | Self::Subset)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Composite => "composite",
            Self::Documentation => "documentation",
            Self::Calibration => "calibration",
            Self::TimeOffset => "time_offset",
            Self::ErrorModel => "errormodel",
            Self::Subset => "subset",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Label/units override of one dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimDocumentation {
    pub dim_id: usize,
    pub label: Option<String>,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Documentation {
    pub label: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub dimensions: Vec<DimDocumentation>,
}

impl Documentation {
    /// Overlay `later` on `self`: non-empty fields of `later` win.
    pub fn merge(&mut self, later: &Documentation) {
        fn pick(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                *slot = Some(v.clone());
            }
        }
        pick(&mut self.label, &later.label);
        pick(&mut self.units, &later.units);
        pick(&mut self.description, &later.description);
        for dim in &later.dimensions {
            match self.dimensions.iter_mut().find(|d| d.dim_id == dim.dim_id) {
                Some(existing) => {
                    pick(&mut existing.label, &dim.label);
                    pick(&mut existing.units, &dim.units);
                }
                None => self.dimensions.push(dim.clone()),
            }
        }
    }
}

/// Which components a calibration touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationTarget {
    #[default]
    All,
    Data,
    /// The (upper / symmetric) error.
    Error,
    /// The lower error of an asymmetric pair.
    AsError,
}

impl CalibrationTarget {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Some(Self::All),
            "data" => Some(Self::Data),
            "error" => Some(Self::Error),
            "aserror" => Some(Self::AsError),
            _ => None,
        }
    }

    pub fn covers_data(self) -> bool {
        matches!(self, Self::All | Self::Data)
    }

    pub fn covers_error(self) -> bool {
        matches!(self, Self::All | Self::Error)
    }

    pub fn covers_aserror(self) -> bool {
        matches!(self, Self::All | Self::AsError)
    }
}

/// Linear calibration of one dimension's coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DimCalibration {
    pub dim_id: usize,
    pub factor: f64,
    pub offset: f64,
    pub invert: bool,
    pub units: Option<String>,
}

/// `value * factor + offset`, or its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub factor: f64,
    pub offset: f64,
    pub invert: bool,
    pub target: CalibrationTarget,
    pub units: Option<String>,
    pub dimensions: Vec<DimCalibration>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            factor: 1.0,
            offset: 0.0,
            invert: false,
            target: CalibrationTarget::All,
            units: None,
            dimensions: Vec::new(),
        }
    }
}

impl Calibration {
    pub fn scale(factor: f64, offset: f64) -> Self {
        Self {
            factor,
            offset,
            ..Self::default()
        }
    }
}

/// Replacement of one dimension from another signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimComposite {
    pub to_dim: usize,
    /// Dimension of the fetched signal to take; `None` uses its data.
    pub from_dim: Option<usize>,
    pub dim_signal: Option<String>,
    pub error: Option<String>,
    pub aserror: Option<String>,
}

/// Wholesale replacement of data, errors and axes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composite {
    pub data: Option<String>,
    pub error: Option<String>,
    pub aserror: Option<String>,
    pub file: Option<String>,
    pub format: Option<String>,
    /// Declared time axis of the result.
    pub order: Option<usize>,
    pub dimensions: Vec<DimComposite>,
    /// Applied, in order, to the composed result.
    pub subsets: Vec<Subset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimErrorModel {
    pub dim_id: usize,
    pub model: ErrorModelKind,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorModelRule {
    pub model: ErrorModelKind,
    pub params: Vec<f64>,
    pub dimensions: Vec<DimErrorModel>,
}

/// Index/value reduction along dimensions.
///
/// `operations[i]` applies to dimension `dim_ids[i]` (default `i`) with
/// bound `bounds[i]` where the operation is a comparison.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subset {
    pub operations: Vec<String>,
    pub bounds: Vec<f64>,
    pub dim_ids: Vec<usize>,
    /// Drop dimensions left with length 1.
    pub reform: bool,
    /// Atomic member of a structures payload to subset instead of the data.
    pub member: Option<String>,
    /// Function applied after subsetting, `name` or `name(dim)`.
    pub function: Option<String>,
    /// Time axis of the result; negative clears it.
    pub order: Option<i32>,
    /// Signal the subset was declared against.
    pub signal: Option<String>,
}

impl Subset {
    pub fn new(operations: &[&str], bounds: &[f64]) -> Self {
        Self {
            operations: operations.iter().map(|s| s.to_string()).collect(),
            bounds: bounds.to_vec(),
            ..Self::default()
        }
    }

    /// Dimension targeted by operation `i`.
    pub fn dim_id(&self, i: usize) -> usize {
        self.dim_ids.get(i).copied().unwrap_or(i)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOffsetMethod {
    /// Add `offset` to every time value.
    #[default]
    Shift,
    /// Replace the axis by `start + i * interval`.
    Regenerate,
}

impl TimeOffsetMethod {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::Shift),
            1 => Some(Self::Regenerate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeOffset {
    pub method: TimeOffsetMethod,
    pub offset: f64,
    pub interval: f64,
}

/// The directive carried by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Composite(Composite),
    Documentation(Documentation),
    Calibration(Calibration),
    TimeOffset(TimeOffset),
    ErrorModel(ErrorModelRule),
    Subset(Subset),
}

impl ActionKind {
    pub fn category(&self) -> ActionCategory {
        match self {
            Self::Composite(_) => ActionCategory::Composite,
            Self::Documentation(_) => ActionCategory::Documentation,
            Self::Calibration(_) => ActionCategory::Calibration,
            Self::TimeOffset(_) => ActionCategory::TimeOffset,
            Self::ErrorModel(_) => ActionCategory::ErrorModel,
            Self::Subset(_) => ActionCategory::Subset,
        }
    }
}

/// One range-scoped directive for a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRule {
    pub id: i32,
    /// Target signal; empty matches every signal.
    pub signal: String,
    pub exp_range: ValidityRange,
    pub pass_range: ValidityRange,
    pub kind: ActionKind,
}

impl ActionRule {
    pub fn new(signal: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: 0,
            signal: signal.into(),
            exp_range: ValidityRange::OPEN,
            pass_range: ValidityRange::OPEN,
            kind,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    pub fn with_exp_range(mut self, range: ValidityRange) -> Self {
        self.exp_range = range;
        self
    }

    pub fn with_pass_range(mut self, range: ValidityRange) -> Self {
        self.pass_range = range;
        self
    }

    pub fn category(&self) -> ActionCategory {
        self.kind.category()
    }

    pub fn matches_signal(&self, signal: &str) -> bool {
        self.signal.is_empty() || self.signal.eq_ignore_ascii_case(signal.trim())
    }

    /// Whether the rule is valid for experiment `exp` and pass `pass`.
    pub fn applies(&self, exp: i32, pass: i32) -> bool {
        self.exp_range.contains(exp) && self.pass_range.contains(pass)
    }
}

/// A rule element left out of a set because its settings did not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRule {
    pub signal: String,
    pub element: String,
    pub error: ActionError,
}

/// Parsed rules, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionSet {
    rules: Vec<ActionRule>,
    rejected: Vec<RejectedRule>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: ActionRule) {
        self.rules.push(rule);
    }

    pub fn reject(&mut self, rejected: RejectedRule) {
        self.rejected.push(rejected);
    }

    pub fn extend(&mut self, other: ActionSet) {
        self.rules.extend(other.rules);
        self.rejected.extend(other.rejected);
    }

    /// Rule elements dropped while loading.
    pub fn rejected(&self) -> &[RejectedRule] {
        &self.rejected
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules for `signal` valid at `(exp, pass)`, in document order.
    pub fn select(&self, signal: &str, exp: i32, pass: i32) -> Vec<&ActionRule> {
        self.rules
            .iter()
            .filter(|r| r.matches_signal(signal) && r.applies(exp, pass))
            .collect()
    }
}

impl FromIterator<ActionRule> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ActionRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
            rejected: Vec::new(),
        }
    }
}

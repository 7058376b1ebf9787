// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Action/Subsetting Engine.
//!
//! Range-scoped rules refine a materialized [`DataBlock`](crate::block::DataBlock)
//! before it is returned:
//!
//! ```text
//! Composite -> Documentation -> Calibration -> TimeOffset -> ErrorModel -> Subset
//!   (all)        (merged)        (last)          (last)        (last)        (all)
//! ```
//!
//! A rule applies when the request's experiment number and pass fall inside
//! its inclusive ranges. A failing rule is rolled back and logged; the block
//! as it was before that rule carries on through the chain.
//!
//! # Example
//!
//! ```rust
//! use uda::action::{ActionEngine, ActionKind, ActionRule, ActionSet, Calibration, NoSignalSource, ValidityRange};
//! use uda::block::{DataBlock, Dim};
//! use uda::buffer::TypedBuffer;
//! use uda::context::RequestContext;
//! use uda::types::DataType;
//!
//! let mut block = DataBlock::with_rank(1);
//! block.set_data(TypedBuffer::Double(vec![1.0, 2.0]), DataType::Double, 2).unwrap();
//! block.set_dim(0, Dim::index(2)).unwrap();
//!
//! let rules: ActionSet = [ActionRule::new("ip", ActionKind::Calibration(Calibration::scale(10.0, 0.0)))
//!     .with_exp_range(ValidityRange::between(1, 500))]
//! .into_iter()
//! .collect();
//!
//! let mut engine = ActionEngine::new();
//! engine.load(rules);
//! let outcome = engine.apply(&RequestContext::new("ip", 42, 0), block, &NoSignalSource);
//! assert_eq!(outcome.block.data_f64(), Some(vec![10.0, 20.0]));
//! assert!(outcome.report.failures.is_empty());
//! ```

mod composite;
mod engine;
mod functions;
mod rule;
mod subset;
mod transforms;
#[cfg(feature = "loaders")]
mod xml;

pub use composite::{MapSignalSource, NoSignalSource, SignalRequest, SignalSource};
pub use engine::{ActionEngine, ActionOutcome, ActionReport, AppliedRule, EngineState, RuleFailure};
pub use functions::{FunctionRegistry, SubsetFunction};
pub use rule::{
    ActionCategory, ActionKind, ActionRule, ActionSet, Calibration, CalibrationTarget, Composite,
    DimCalibration, DimComposite, DimDocumentation, DimErrorModel, Documentation,
    ErrorModelRule, RejectedRule, Subset, TimeOffset, TimeOffsetMethod, ValidityRange,
};
pub use subset::{apply_subset, Comparison, SubsetOp};
#[cfg(feature = "loaders")]
pub use xml::parse_actions;

use crate::block::DataBlockError;
use thiserror::Error;

/// Action failures. Rule-level errors are recovered by the engine, and an
/// [`ActionError::InvalidAttribute`] drops only the rule it belongs to; only
/// [`ActionError::Document`] aborts loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("malformed bound expression '{0}'")]
    MalformedBound(String),

    #[error("dimension {dim} out of range for rank {rank}")]
    UnknownDimension { dim: usize, rank: usize },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("malformed action document: {0}")]
    Document(String),

    #[error("invalid value '{value}' for attribute '{attribute}' of <{element}>")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("calibration factor is zero, cannot invert")]
    ZeroFactor,

    #[error("signal '{signal}' unavailable: {reason}")]
    SignalUnavailable { signal: String, reason: String },

    #[error("length mismatch: expected {expected} values, got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("block has no numeric data")]
    NoNumericData,

    #[error("block has no time dimension")]
    NoTimeDimension,

    #[error("subset selects nothing along dimension {dim}")]
    EmptySubset { dim: usize },

    #[error("member extraction failed: {0}")]
    Member(String),

    #[error(transparent)]
    Block(#[from] DataBlockError),
}

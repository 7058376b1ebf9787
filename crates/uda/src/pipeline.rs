// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request pipeline: materialize -> act -> return.
//!
//! ```text
//!  BlockProducer ──> validate ──> ActionEngine ──> validate ──> caller
//!        ^                            │
//!        └──── composite signals ─────┘
//! ```
//!
//! The cache in front of the pipeline stores the flat form produced by
//! [`Pipeline::to_cache`].

use crate::action::{ActionEngine, ActionError, ActionReport, SignalRequest, SignalSource};
use crate::block::{deserialize_block, serialize_block, DataBlock};
use crate::config::UdaConfig;
use crate::context::{RequestContext, SessionContext};
use crate::error::{Error, Result};
use crate::types::TypeRegistry;

/// A backing-store reader.
pub trait BlockProducer {
    fn produce(&self, request: &RequestContext) -> Result<DataBlock>;
}

impl<F> BlockProducer for F
where
    F: Fn(&RequestContext) -> Result<DataBlock>,
{
    fn produce(&self, request: &RequestContext) -> Result<DataBlock> {
        self(request)
    }
}

/// Composite lookups served by the same producer as the request.
struct ProducerSource<'a> {
    producer: &'a dyn BlockProducer,
}

impl SignalSource for ProducerSource<'_> {
    fn fetch(&self, request: &SignalRequest, ctx: &RequestContext) -> std::result::Result<DataBlock, ActionError> {
        let mut ctx = ctx.clone();
        if let Some(file) = &request.file {
            ctx.source = Some(file.clone());
        }
        self.producer
            .produce(&ctx)
            .map_err(|e| ActionError::SignalUnavailable {
                signal: request.signal.clone(),
                reason: e.to_string(),
            })
    }
}

/// A processed block.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub block: DataBlock,
    pub report: ActionReport,
}

/// Validates, transforms and packages Data Blocks for one registry.
#[derive(Debug)]
pub struct Pipeline<'r> {
    registry: &'r TypeRegistry,
    engine: ActionEngine,
    config: UdaConfig,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r TypeRegistry, config: UdaConfig) -> Self {
        Self {
            registry,
            engine: ActionEngine::from_config(&config),
            config,
        }
    }

    pub fn with_engine(mut self, engine: ActionEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ActionEngine {
        &mut self.engine
    }

    pub fn config(&self) -> &UdaConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Run a produced block through the action engine.
    ///
    /// An inconsistent block from the producer is an error. Rule failures
    /// are not: they show up in the report.
    pub fn process(
        &self,
        session: &mut SessionContext,
        request: &RequestContext,
        block: DataBlock,
        source: &dyn SignalSource,
    ) -> Result<PipelineOutput> {
        if session.observe(request) {
            log::debug!("[pipeline] session moved to experiment {}", request.exp_number);
        }
        if let Err(e) = block.validate() {
            session.record_failure();
            log::warn!("[pipeline] {} produced an invalid block: {}", request, e);
            return Err(Error::DataBlock(e));
        }

        let outcome = self.engine.apply(request, block, source);
        if let Err(e) = outcome.block.validate() {
            session.record_failure();
            return Err(Error::DataBlock(e));
        }
        log::debug!(
            "[pipeline] {}: {} rules applied, {} failed",
            request,
            outcome.report.applied.len(),
            outcome.report.failures.len()
        );
        Ok(PipelineOutput {
            block: outcome.block,
            report: outcome.report,
        })
    }

    /// Materialize `request` from `producer`, then [`process`](Self::process)
    /// it. Composite signals come from the same producer.
    pub fn fetch(
        &self,
        session: &mut SessionContext,
        request: &RequestContext,
        producer: &dyn BlockProducer,
    ) -> Result<PipelineOutput> {
        let block = match producer.produce(request) {
            Ok(block) => block,
            Err(e) => {
                session.observe(request);
                session.record_failure();
                return Err(e);
            }
        };
        self.process(session, request, block, &ProducerSource { producer })
    }

    /// Flat cache form of `block`.
    pub fn to_cache(&self, block: &DataBlock) -> Result<Vec<u8>> {
        Ok(serialize_block(block, self.registry)?)
    }

    /// Rebuild a block from its cache form.
    pub fn from_cache(&self, bytes: &[u8]) -> Result<DataBlock> {
        Ok(deserialize_block(bytes, self.registry, &self.config.limits)?)
    }
}

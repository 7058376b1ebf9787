// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-request and per-session context.
//!
//! State that a reader would otherwise keep in statics (the last experiment
//! seen, how many requests a client made) lives in a [`SessionContext`]
//! owned by the connection and passed through the pipeline.

use std::fmt;

/// What is being asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub signal: String,
    pub exp_number: i32,
    pub pass: i32,
    /// Backing-store source, if the request names one.
    pub source: Option<String>,
}

impl RequestContext {
    pub fn new(signal: impl Into<String>, exp_number: i32, pass: i32) -> Self {
        Self {
            signal: signal.into(),
            exp_number,
            pass,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The same request for another signal (composite lookups).
    pub fn for_signal(&self, signal: &str) -> Self {
        Self {
            signal: signal.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.signal, self.exp_number, self.pass)
    }
}

/// State carried across the requests of one client session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    last_exp_number: Option<i32>,
    last_signal: Option<String>,
    request_count: u64,
    failed_count: u64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. Returns `true` when the experiment differs from the
    /// previous request's (readers reopen their sources then).
    pub fn observe(&mut self, request: &RequestContext) -> bool {
        let changed = self.last_exp_number != Some(request.exp_number);
        self.last_exp_number = Some(request.exp_number);
        self.last_signal = Some(request.signal.clone());
        self.request_count += 1;
        changed
    }

    pub fn record_failure(&mut self) {
        self.failed_count += 1;
    }

    pub fn last_exp_number(&self) -> Option<i32> {
        self.last_exp_number
    }

    pub fn last_signal(&self) -> Option<&str> {
        self.last_signal.as_deref()
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// Forget everything (session closed).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

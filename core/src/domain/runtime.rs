// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Isolation Boundary
//!
//! [`IsolationBackend`] is the seam between the engine and whatever
//! isolation primitive the platform provides (separate process,
//! microVM, or a hardened in-process sandbox with capability-scoped
//! host bindings). The contract holds regardless of mechanism:
//! deny-by-default, honor the granted set only, and report observed
//! violations. Deadline enforcement is owned by the engine, which
//! forcibly aborts the backend task — backends need no cooperative
//! cancellation support.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::domain::capability::Capability;
use crate::domain::violation::SecurityViolation;

/// Resource ceilings for one isolated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    pub memory_bytes: u64,
}

/// What the isolated context produced on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    /// Peak memory the context measured for the run. Best effort; the
    /// auditor re-checks it against the ceiling after the fact.
    pub memory_bytes_used: u64,
    /// Operations the context attempted and blocked in-flight.
    pub violations: Vec<SecurityViolation>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to construct isolated context: {0}")]
    ContextFailed(String),

    #[error("module execution failed: {0}")]
    ExecutionFailed(String),
}

/// The only component permitted to give a granted capability its
/// real-world effect — and only for capabilities in `granted`.
#[async_trait]
pub trait IsolationBackend: Send + Sync {
    async fn execute(
        &self,
        module: &[u8],
        granted: &BTreeSet<Capability>,
        limits: ResourceLimits,
    ) -> Result<ExecutionOutcome, RuntimeError>;
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Record Aggregate
//!
//! One record per sandbox run. Created when the run is requested,
//! mutated only by the engine and auditor during that run, then frozen
//! and appended to the ledger once a terminal status is reached.
//!
//! State machine (terminal states starred):
//! `Submitted → PreChecking → {SecurityViolation*, Running}` and
//! `Running → {Completed*, Failed*, Timeout*, Error*}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::capability::Capability;
use crate::domain::exception::ExceptionId;
use crate::domain::runtime::ExecutionOutcome;
use crate::domain::violation::SecurityViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Submitted,
    PreChecking,
    SecurityViolation,
    Running,
    Completed,
    Failed,
    Timeout,
    Error,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::SecurityViolation
                | ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Timeout
                | ExecutionStatus::Error
        )
    }
}

/// A request to run one untrusted module.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Raw module payload (wasm binary or directive text).
    pub module: Vec<u8>,
    /// Capability names as submitted; resolved during vetting.
    pub requested: Vec<String>,
    /// Identifier of the submitting party, used for frequency limiting.
    pub source: String,
}

impl ExecutionRequest {
    pub fn new(
        module: impl Into<Vec<u8>>,
        requested: impl IntoIterator<Item = impl Into<String>>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            requested: requested.into_iter().map(Into::into).collect(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub source: String,
    pub status: ExecutionStatus,
    /// SHA-256 of the module payload, for correlating audit evidence.
    pub module_digest: String,
    pub requested: Vec<String>,
    pub granted: BTreeSet<Capability>,
    /// Exceptions consumed to grant blocked capabilities for this run.
    pub consumed_exceptions: Vec<ExceptionId>,
    pub violations: Vec<SecurityViolation>,
    pub outcome: Option<ExecutionOutcome>,
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl ExecutionRecord {
    pub fn new(request: &ExecutionRequest) -> Self {
        Self {
            id: ExecutionId::new(),
            source: request.source.clone(),
            status: ExecutionStatus::Submitted,
            module_digest: hex::encode(Sha256::digest(&request.module)),
            requested: request.requested.clone(),
            granted: BTreeSet::new(),
            consumed_exceptions: Vec::new(),
            violations: Vec::new(),
            outcome: None,
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
        }
    }

    pub fn begin_pre_check(&mut self) {
        self.status = ExecutionStatus::PreChecking;
    }

    /// Terminal: pre-checks produced at least one violation.
    pub fn reject(&mut self, violations: Vec<SecurityViolation>) {
        self.violations.extend(violations);
        self.finalize(ExecutionStatus::SecurityViolation);
    }

    pub fn start(&mut self, granted: BTreeSet<Capability>, consumed: Vec<ExceptionId>) {
        self.granted = granted;
        self.consumed_exceptions = consumed;
        self.status = ExecutionStatus::Running;
    }

    pub fn complete(&mut self, outcome: ExecutionOutcome) {
        self.outcome = Some(outcome);
        self.finalize(ExecutionStatus::Completed);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
        self.finalize(ExecutionStatus::Failed);
    }

    pub fn time_out(&mut self, limit: Duration) {
        self.failure = Some(format!("deadline of {limit:?} exceeded"));
        self.finalize(ExecutionStatus::Timeout);
    }

    /// Terminal fallback for engine-internal faults so no record is
    /// ever left in `Running`.
    pub fn fault(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
        self.finalize(ExecutionStatus::Error);
    }

    pub fn record_violation(&mut self, violation: SecurityViolation) {
        self.violations.push(violation);
    }

    /// View a terminal record through the engine's error taxonomy, for
    /// callers that prefer `Result`-style handling. `None` while the
    /// run is in flight or when it completed cleanly.
    pub fn as_error(&self) -> Option<SandboxError> {
        match self.status {
            ExecutionStatus::Submitted
            | ExecutionStatus::PreChecking
            | ExecutionStatus::Running
            | ExecutionStatus::Completed => None,
            ExecutionStatus::SecurityViolation => Some(SandboxError::ValidationRejected {
                violations: self.violations.clone(),
            }),
            ExecutionStatus::Timeout => Some(SandboxError::Timeout),
            ExecutionStatus::Failed => Some(SandboxError::RuntimeFailure(
                self.failure.clone().unwrap_or_default(),
            )),
            ExecutionStatus::Error => Some(SandboxError::InternalFault(
                self.failure.clone().unwrap_or_default(),
            )),
        }
    }

    fn finalize(&mut self, status: ExecutionStatus) {
        debug_assert!(status.is_terminal());
        let ended = Utc::now();
        self.status = status;
        self.ended_at = Some(ended);
        self.duration_ms = Some(
            (ended - self.started_at)
                .num_milliseconds()
                .try_into()
                .unwrap_or(0),
        );
    }
}

/// Error taxonomy of the engine's public surface.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Pre-check produced one or more violations; execution never started.
    #[error("validation rejected with {} violation(s)", violations.len())]
    ValidationRejected { violations: Vec<SecurityViolation> },

    /// Authority signature did not verify for the requested capability.
    #[error("invalid authority signature: {0}")]
    InvalidSignature(String),

    /// No exception with the given id exists.
    #[error("exception not found: {0}")]
    ExceptionNotFound(ExceptionId),

    /// Deadline exceeded; the isolated context was forcibly terminated.
    #[error("execution exceeded its deadline")]
    Timeout,

    /// The isolated context reported an internal execution error.
    #[error("runtime failure: {0}")]
    RuntimeFailure(String),

    /// Unexpected failure in the engine itself. Always surfaced.
    #[error("internal fault: {0}")]
    InternalFault(String),
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

/// Severity attached to every recorded policy deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severities at or above `High` demote an otherwise successful
    /// execution during post-audit.
    pub fn is_blocking(&self) -> bool {
        *self >= Severity::High
    }
}

/// Type tag for a [`SecurityViolation`]. Serialized snake_case names
/// are the wire form consumers see in events and audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Candidate module exceeds the configured byte ceiling.
    CodeSizeExceeded,
    /// Dynamic code evaluation signature found in the module.
    CodeInjectionRisk,
    /// Module imports a gated host facility (fs/net/process).
    ForbiddenImport,
    /// Unbounded or raw allocation signature found in the module.
    UnsafeMemoryAccess,
    /// Blocked capability requested with no valid exception.
    CapabilityNotGranted,
    /// Requested capability is outside the vocabulary.
    UnknownCapability,
    /// Source identifier exceeded the sliding-window rate ceiling.
    ExecutionFrequencyExceeded,
    /// Measured memory usage exceeded the configured ceiling.
    MemoryLimitExceeded,
    /// The isolation context blocked an attempted operation at runtime.
    BlockedOperation,
    /// Produced output resembles a network location or contact identifier.
    OutputLeakage,
}

/// Immutable evidence attached to an execution record. Never removed
/// or rewritten once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityViolation {
    pub kind: ViolationKind,
    pub detail: String,
    pub severity: Severity,
}

impl SecurityViolation {
    pub fn new(kind: ViolationKind, severity: Severity, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            severity,
        }
    }
}

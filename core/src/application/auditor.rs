// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Post-Execution Auditor
//!
//! Inspects the outcome of an isolated run after the fact: memory
//! ceiling (the isolation context's preemptive capping may be
//! imprecise, so the measurement is re-checked here), propagation of
//! in-execution violations, and an advisory output-leakage scan that
//! never blocks the already-produced result.

use regex::Regex;
use tracing::warn;

use crate::domain::runtime::ExecutionOutcome;
use crate::domain::violation::{SecurityViolation, Severity, ViolationKind};

struct LeakPattern {
    pattern: Regex,
    severity: Severity,
    label: &'static str,
}

pub struct PostExecutionAuditor {
    memory_limit_bytes: u64,
    leak_patterns: Vec<LeakPattern>,
}

impl PostExecutionAuditor {
    pub fn new(memory_limit_bytes: u64) -> anyhow::Result<Self> {
        let entries: [(&str, Severity, &str); 3] = [
            (
                r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
                Severity::Medium,
                "output contains an IPv4 address",
            ),
            (
                r"(?i)\bhttps?://[^\s]+",
                Severity::Medium,
                "output contains a URL",
            ),
            (
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
                Severity::Low,
                "output contains an e-mail address",
            ),
        ];
        let leak_patterns = entries
            .into_iter()
            .map(|(pattern, severity, label)| {
                Ok(LeakPattern {
                    pattern: Regex::new(pattern)?,
                    severity,
                    label,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self {
            memory_limit_bytes,
            leak_patterns,
        })
    }

    /// Audit one outcome. Returned violations are evidence for the
    /// record; whether any of them demotes the run is decided by the
    /// engine via [`Severity::is_blocking`].
    pub fn audit(&self, outcome: &ExecutionOutcome) -> Vec<SecurityViolation> {
        let mut violations = Vec::new();

        if outcome.memory_bytes_used > self.memory_limit_bytes {
            warn!(
                used = outcome.memory_bytes_used,
                limit = self.memory_limit_bytes,
                "memory ceiling exceeded"
            );
            violations.push(SecurityViolation::new(
                ViolationKind::MemoryLimitExceeded,
                Severity::High,
                format!(
                    "measured {} bytes, ceiling is {}",
                    outcome.memory_bytes_used, self.memory_limit_bytes
                ),
            ));
        }

        // In-execution violations observed by the context itself.
        violations.extend(outcome.violations.iter().cloned());

        // Advisory leakage scan: evidence only, never blocking.
        for leak in &self.leak_patterns {
            if leak.pattern.is_match(&outcome.output) {
                warn!(pattern = leak.label, "possible output leakage");
                violations.push(SecurityViolation::new(
                    ViolationKind::OutputLeakage,
                    leak.severity,
                    leak.label,
                ));
            }
        }

        violations
    }
}

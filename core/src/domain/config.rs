// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::runtime::ResourceLimits;

/// Engine-wide configuration. Built once at startup; every field has a
/// conservative default so an empty config file yields the no-egress
/// posture with sane ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Ceiling on candidate module size in bytes.
    pub max_module_bytes: usize,

    /// Wall-clock deadline for one isolated run.
    #[serde(with = "humantime_serde")]
    pub execution_deadline: Duration,

    /// Memory ceiling per run, checked by the auditor after the fact.
    pub memory_limit_bytes: u64,

    /// Sliding window for the per-source execution-frequency check.
    #[serde(with = "humantime_serde")]
    pub rate_window: Duration,

    /// Maximum executions per source within `rate_window`.
    pub rate_ceiling: usize,

    /// Default validity window for a granted exception.
    #[serde(with = "humantime_serde")]
    pub exception_ttl: Duration,

    /// Usage ceiling for a granted exception.
    pub exception_max_uses: u32,

    /// Buffer capacity of the notification event channel.
    pub event_capacity: usize,
}

impl SandboxConfig {
    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            deadline: self.execution_deadline,
            memory_bytes: self.memory_limit_bytes,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_module_bytes: 10 * 1024 * 1024,
            execution_deadline: Duration::from_secs(30),
            memory_limit_bytes: 128 * 1024 * 1024,
            rate_window: Duration::from_secs(60),
            rate_ceiling: 10,
            exception_ttl: Duration::from_secs(300),
            exception_max_uses: 10,
            event_capacity: 1000,
        }
    }
}

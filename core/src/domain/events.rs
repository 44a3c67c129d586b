// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle events emitted to the external notification fabric.
//!
//! Consumers must not assume delivery ordering across different
//! execution ids; ordering is only guaranteed per entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::capability::Capability;
use crate::domain::exception::ExceptionId;
use crate::domain::execution::{ExecutionId, ExecutionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxEvent {
    ExecutionFinalized {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        granted: BTreeSet<Capability>,
        violation_count: usize,
        at: DateTime<Utc>,
    },
    ExceptionGranted {
        exception_id: ExceptionId,
        capability: Capability,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ExceptionRevoked {
        exception_id: ExceptionId,
        at: DateTime<Utc>,
    },
}

impl SandboxEvent {
    /// Id of the entity this event belongs to, as a display string.
    /// Per-entity ordering is keyed on this.
    pub fn entity_id(&self) -> String {
        match self {
            SandboxEvent::ExecutionFinalized { execution_id, .. } => execution_id.to_string(),
            SandboxEvent::ExceptionGranted { exception_id, .. }
            | SandboxEvent::ExceptionRevoked { exception_id, .. } => exception_id.to_string(),
        }
    }
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod capability;
pub mod config;
pub mod events;
pub mod exception;
pub mod execution;
pub mod ledger;
pub mod runtime;
pub mod violation;

pub use capability::{Capability, CapabilityClass, CapabilityPolicy};
pub use config::SandboxConfig;
pub use events::SandboxEvent;
pub use exception::{CapabilityException, ExceptionId};
pub use execution::{
    ExecutionId, ExecutionRecord, ExecutionRequest, ExecutionStatus, SandboxError,
};
pub use ledger::ExecutionLedger;
pub use runtime::{ExecutionOutcome, IsolationBackend, ResourceLimits, RuntimeError};
pub use violation::{SecurityViolation, Severity, ViolationKind};

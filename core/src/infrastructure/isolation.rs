// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # In-Process Reference Backend
//!
//! A hardened in-process sandbox with capability-scoped host bindings —
//! the weakest of the isolation mechanisms the engine supports, and the
//! one used for development and tests. Production deployments put a
//! separate process or microVM behind [`IsolationBackend`] instead.
//!
//! The backend interprets a line-oriented directive format:
//!
//! | Directive | Capability required | Effect |
//! |-----------|--------------------|--------|
//! | `emit <text>` | — | append text to the output |
//! | `sleep <ms>` | — | consume wall clock |
//! | `alloc <bytes>` | memory | account allocation |
//! | `connect <host>` | network | host binding |
//! | `read <path>` / `write <path>` | filesystem | host binding |
//! | `spawn <cmd>` | process | host binding |
//! | `env <name>` | system | host binding |
//! | `trap <msg>` | — | abort with a runtime error |
//!
//! Every host-facing directive checks the granted set; a missing
//! capability produces a `blocked_operation` violation instead of the
//! effect. This reference backend records bindings into the output
//! rather than performing real side effects; a production backend wires
//! them to the host.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use crate::domain::capability::Capability;
use crate::domain::runtime::{ExecutionOutcome, IsolationBackend, ResourceLimits, RuntimeError};
use crate::domain::violation::{SecurityViolation, Severity, ViolationKind};

pub struct InProcessBackend;

impl InProcessBackend {
    pub fn new() -> Self {
        Self
    }

    fn blocked(op: &str, capability: Capability) -> SecurityViolation {
        SecurityViolation::new(
            ViolationKind::BlockedOperation,
            Severity::Medium,
            format!("'{op}' blocked: capability '{capability}' not granted"),
        )
    }
}

impl Default for InProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IsolationBackend for InProcessBackend {
    async fn execute(
        &self,
        module: &[u8],
        granted: &BTreeSet<Capability>,
        _limits: ResourceLimits,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        if module.starts_with(b"\0asm") {
            return Err(RuntimeError::ContextFailed(
                "wasm modules require an external VM backend".to_string(),
            ));
        }
        let source = std::str::from_utf8(module)
            .map_err(|_| RuntimeError::ExecutionFailed("module is not valid UTF-8".to_string()))?;

        let mut output = Vec::new();
        let mut violations = Vec::new();
        let mut memory_bytes_used: u64 = 0;

        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (op, arg) = line.split_once(' ').unwrap_or((line, ""));
            debug!(line_no, op, "interpreting directive");

            match op {
                "emit" => output.push(arg.to_string()),
                "sleep" => {
                    let ms: u64 = arg.parse().map_err(|_| {
                        RuntimeError::ExecutionFailed(format!(
                            "line {}: invalid sleep duration '{arg}'",
                            line_no + 1
                        ))
                    })?;
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                "alloc" => {
                    let bytes: u64 = arg.parse().map_err(|_| {
                        RuntimeError::ExecutionFailed(format!(
                            "line {}: invalid allocation size '{arg}'",
                            line_no + 1
                        ))
                    })?;
                    if granted.contains(&Capability::Memory) {
                        memory_bytes_used = memory_bytes_used.saturating_add(bytes);
                    } else {
                        violations.push(Self::blocked(op, Capability::Memory));
                    }
                }
                "connect" => {
                    if granted.contains(&Capability::Network) {
                        output.push(format!("connect:{arg}"));
                    } else {
                        violations.push(Self::blocked(op, Capability::Network));
                    }
                }
                "read" | "write" => {
                    if granted.contains(&Capability::Filesystem) {
                        output.push(format!("{op}:{arg}"));
                    } else {
                        violations.push(Self::blocked(op, Capability::Filesystem));
                    }
                }
                "spawn" => {
                    if granted.contains(&Capability::Process) {
                        output.push(format!("spawn:{arg}"));
                    } else {
                        violations.push(Self::blocked(op, Capability::Process));
                    }
                }
                "env" => {
                    if granted.contains(&Capability::System) {
                        output.push(format!("env:{arg}"));
                    } else {
                        violations.push(Self::blocked(op, Capability::System));
                    }
                }
                "trap" => {
                    return Err(RuntimeError::ExecutionFailed(format!(
                        "module trapped: {arg}"
                    )));
                }
                other => {
                    return Err(RuntimeError::ExecutionFailed(format!(
                        "line {}: unknown directive '{other}'",
                        line_no + 1
                    )));
                }
            }
        }

        Ok(ExecutionOutcome {
            output: output.join("\n"),
            memory_bytes_used,
            violations,
        })
    }
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sandbox Engine
//!
//! The isolated execution supervisor and the engine's public surface.
//! `submit` drives the full pipeline: vetting → deadline-guarded
//! isolated execution → post-audit → ledger append → event emission.
//!
//! The backend task runs under `tokio::time::timeout`; on deadline the
//! task is aborted, so an isolated context can never outlive its
//! deadline. Every path — including engine-internal faults — finalizes
//! the record, so the ledger never holds a record stuck in `running`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::capability::CapabilityPolicy;
use crate::domain::config::SandboxConfig;
use crate::domain::events::SandboxEvent;
use crate::domain::exception::CapabilityException;
use crate::domain::execution::{
    ExecutionId, ExecutionRecord, ExecutionRequest, SandboxError,
};
use crate::domain::ledger::ExecutionLedger;
use crate::domain::runtime::{IsolationBackend, ResourceLimits};
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

use super::auditor::PostExecutionAuditor;
use super::exceptions::CapabilityExceptionManager;
use super::keyring::AuthorityKeyring;
use super::vetting::StaticVettingAnalyzer;

pub struct SandboxEngine {
    analyzer: StaticVettingAnalyzer,
    auditor: PostExecutionAuditor,
    exceptions: Arc<CapabilityExceptionManager>,
    backend: Arc<dyn IsolationBackend>,
    ledger: Arc<dyn ExecutionLedger>,
    events: EventBus,
    limits: ResourceLimits,
}

impl SandboxEngine {
    pub fn new(
        config: SandboxConfig,
        policy: CapabilityPolicy,
        keyring: AuthorityKeyring,
        backend: Arc<dyn IsolationBackend>,
        ledger: Arc<dyn ExecutionLedger>,
    ) -> anyhow::Result<Self> {
        let events = EventBus::new(config.event_capacity);
        let exceptions = Arc::new(CapabilityExceptionManager::new(
            keyring,
            &config,
            events.clone(),
        ));
        let analyzer = StaticVettingAnalyzer::new(
            policy,
            Arc::clone(&exceptions),
            Arc::clone(&ledger),
            &config,
        )?;
        let auditor = PostExecutionAuditor::new(config.memory_limit_bytes)?;
        Ok(Self {
            analyzer,
            auditor,
            exceptions,
            backend,
            ledger,
            events,
            limits: config.limits(),
        })
    }

    /// Run one untrusted module end to end and return the finalized
    /// execution record.
    ///
    /// Policy-level outcomes — rejection, timeout, runtime failure —
    /// are reported inside the record so the caller always receives
    /// auditable evidence. `Err` is reserved for engine-internal
    /// faults, which still finalize and append the record first.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<ExecutionRecord, SandboxError> {
        let mut record = ExecutionRecord::new(&request);
        info!(
            execution_id = %record.id,
            source = %record.source,
            requested = ?request.requested,
            "execution submitted"
        );

        record.begin_pre_check();
        let report = self.analyzer.analyze(&request).await;
        if !report.passed() {
            record.reject(report.violations);
            self.finalize(&record).await?;
            return Ok(record);
        }

        record.start(report.granted.clone(), report.consumed_exceptions);
        info!(execution_id = %record.id, granted = ?record.granted, "starting isolated execution");

        let backend = Arc::clone(&self.backend);
        let module = request.module;
        let granted = report.granted;
        let limits = self.limits;
        let mut handle =
            tokio::spawn(async move { backend.execute(&module, &granted, limits).await });

        match tokio::time::timeout(limits.deadline, &mut handle).await {
            Ok(Ok(Ok(outcome))) => {
                let audit_violations = self.auditor.audit(&outcome);
                let blocking = audit_violations.iter().any(|v| v.severity.is_blocking());
                for violation in audit_violations {
                    record.record_violation(violation);
                }
                if blocking {
                    record.fail("post-audit found a blocking-severity violation");
                } else {
                    record.complete(outcome);
                }
            }
            Ok(Ok(Err(runtime_error))) => {
                warn!(execution_id = %record.id, %runtime_error, "isolated execution failed");
                record.fail(runtime_error.to_string());
            }
            Ok(Err(join_error)) => {
                error!(execution_id = %record.id, %join_error, "isolation task fault");
                record.fault(format!("isolation task fault: {join_error}"));
                self.finalize(&record).await?;
                return Err(SandboxError::InternalFault(join_error.to_string()));
            }
            Err(_elapsed) => {
                // Forcible, supervisor-initiated termination: the
                // context gets no cooperative signal and no partial
                // output is considered valid.
                handle.abort();
                warn!(execution_id = %record.id, deadline = ?limits.deadline, "deadline exceeded, context terminated");
                record.time_out(limits.deadline);
            }
        }

        self.finalize(&record).await?;
        Ok(record)
    }

    async fn finalize(&self, record: &ExecutionRecord) -> Result<(), SandboxError> {
        self.ledger
            .append(record.clone())
            .await
            .map_err(|e| SandboxError::InternalFault(e.to_string()))?;
        self.events.publish(SandboxEvent::ExecutionFinalized {
            execution_id: record.id,
            status: record.status,
            granted: record.granted.clone(),
            violation_count: record.violations.len(),
            at: Utc::now(),
        });
        info!(
            execution_id = %record.id,
            status = ?record.status,
            violations = record.violations.len(),
            duration_ms = record.duration_ms,
            "execution finalized"
        );
        Ok(())
    }

    // ── Audit query surface ──────────────────────────────────────────

    pub async fn execution(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.ledger.find_by_id(id).await
    }

    pub async fn executions(&self) -> Vec<ExecutionRecord> {
        self.ledger.list().await
    }

    pub async fn exceptions(&self) -> Vec<CapabilityException> {
        self.exceptions.list().await
    }

    /// Exception management surface (grant/revoke).
    pub fn exception_manager(&self) -> &Arc<CapabilityExceptionManager> {
        &self.exceptions
    }

    /// Subscribe to the outbound notification fabric.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end scenarios for the sandbox engine: vetting outcomes,
//! exception-gated grants, deadline enforcement, post-audit, ledger
//! and event behavior.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use warden_core::application::{AuthorityKeyring, SandboxEngine};
use warden_core::domain::{
    Capability, CapabilityPolicy, ExecutionRequest, ExecutionStatus, SandboxConfig, SandboxEvent,
    Severity, ViolationKind,
};
use warden_core::infrastructure::{InMemoryExecutionLedger, InProcessBackend};

struct Harness {
    engine: SandboxEngine,
    authority: SigningKey,
}

fn harness(config: SandboxConfig) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let authority = SigningKey::generate(&mut OsRng);
    let keyring = AuthorityKeyring::from_keys(vec![authority.verifying_key()]).unwrap();
    let engine = SandboxEngine::new(
        config,
        CapabilityPolicy::default(),
        keyring,
        Arc::new(InProcessBackend::new()),
        Arc::new(InMemoryExecutionLedger::new()),
    )
    .unwrap();
    Harness { engine, authority }
}

impl Harness {
    fn sign_grant(&self, capability: Capability) -> String {
        let message = AuthorityKeyring::grant_message(capability);
        STANDARD.encode(self.authority.sign(&message).to_bytes())
    }
}

fn request(module: &str, caps: &[&str], source: &str) -> ExecutionRequest {
    ExecutionRequest::new(module.as_bytes().to_vec(), caps.iter().copied(), source)
}

// Scenario A: clean module, allowed capabilities only.
#[tokio::test]
async fn clean_module_with_allowed_capabilities_completes() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("emit hello", &["compute", "memory"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record.violations.is_empty());
    assert_eq!(
        record.granted,
        [Capability::Compute, Capability::Memory].into_iter().collect()
    );
    assert_eq!(record.outcome.as_ref().unwrap().output, "hello");
    assert!(record.duration_ms.is_some());
}

// Scenario B: blocked capability with no exception — supervisor never runs.
#[tokio::test]
async fn blocked_capability_without_exception_is_rejected() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("emit hi", &["network"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::SecurityViolation);
    assert_eq!(record.violations.len(), 1);
    assert_eq!(record.violations[0].kind, ViolationKind::CapabilityNotGranted);
    // The supervisor was never invoked.
    assert!(record.outcome.is_none());
    assert!(record.granted.is_empty());
}

// Scenario C: a signed grant with ceiling 10 authorizes exactly 10 runs.
#[tokio::test]
async fn exception_usage_ceiling_bounds_grants() {
    let config = SandboxConfig {
        rate_ceiling: 100, // keep the frequency check out of this scenario
        ..Default::default()
    };
    let h = harness(config);
    let signature = h.sign_grant(Capability::Network);
    h.engine
        .exception_manager()
        .grant(Capability::Network, &signature, None)
        .await
        .unwrap();

    for i in 0..10 {
        let record = h
            .engine
            .submit(request("connect api.example.org", &["network"], "alice"))
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed, "run {i}");
        assert!(record.granted.contains(&Capability::Network));
        assert_eq!(record.consumed_exceptions.len(), 1);
    }

    let eleventh = h
        .engine
        .submit(request("connect api.example.org", &["network"], "alice"))
        .await
        .unwrap();
    assert_eq!(eleventh.status, ExecutionStatus::SecurityViolation);
    assert!(eleventh
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::CapabilityNotGranted));

    let exceptions = h.engine.exceptions().await;
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].uses, exceptions[0].max_uses);
}

// Scenario D: dynamic code evaluation is rejected regardless of capabilities.
#[tokio::test]
async fn code_injection_signature_is_rejected() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("x = eval(payload)", &["compute"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::SecurityViolation);
    let injection = record
        .violations
        .iter()
        .find(|v| v.kind == ViolationKind::CodeInjectionRisk)
        .expect("code_injection_risk violation");
    assert_eq!(injection.severity, Severity::High);
    assert!(record.outcome.is_none());
}

// Scenario E: per-source sliding-window frequency ceiling.
#[tokio::test]
async fn frequency_ceiling_is_per_source() {
    let h = harness(SandboxConfig::default());

    for _ in 0..10 {
        let record = h
            .engine
            .submit(request("emit hi", &["compute"], "alice"))
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
    }

    let eleventh = h
        .engine
        .submit(request("emit hi", &["compute"], "alice"))
        .await
        .unwrap();
    assert_eq!(eleventh.status, ExecutionStatus::SecurityViolation);
    assert!(eleventh
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::ExecutionFrequencyExceeded));

    // A different source in the same window is unaffected.
    let other = h
        .engine
        .submit(request("emit hi", &["compute"], "bob"))
        .await
        .unwrap();
    assert_eq!(other.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn deadline_overrun_always_finalizes_as_timeout() {
    let config = SandboxConfig {
        execution_deadline: Duration::from_millis(100),
        ..Default::default()
    };
    let h = harness(config);
    let record = h
        .engine
        .submit(request("sleep 10000", &["compute"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Timeout);
    assert!(record.failure.as_deref().unwrap().contains("deadline"));
    // The forcibly terminated run yields no partial output.
    assert!(record.outcome.is_none());
    // Well under the module's requested 10s sleep.
    assert!(record.duration_ms.unwrap() < 5_000);
}

#[tokio::test]
async fn runtime_trap_finalizes_as_failed() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("trap stack overflow", &["compute"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.failure.as_deref().unwrap().contains("trapped"));
    assert!(matches!(
        record.as_error(),
        Some(warden_core::domain::SandboxError::RuntimeFailure(_))
    ));
}

#[tokio::test]
async fn memory_overshoot_is_demoted_in_post_audit() {
    let config = SandboxConfig {
        memory_limit_bytes: 1024,
        ..Default::default()
    };
    let h = harness(config);
    let record = h
        .engine
        .submit(request("alloc 4096\nemit done", &["compute", "memory"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::MemoryLimitExceeded));
}

#[tokio::test]
async fn blocked_runtime_operation_is_recorded_but_not_fatal() {
    let h = harness(SandboxConfig::default());
    // Module only requested compute; its connect attempt is blocked
    // inside the context and surfaces as post-audit evidence.
    let record = h
        .engine
        .submit(request("connect exfil.example.com\nemit ok", &["compute"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::BlockedOperation));
    assert_eq!(record.outcome.as_ref().unwrap().output, "ok");
}

#[tokio::test]
async fn output_leakage_is_advisory_only() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("emit reach me at 203.0.113.9", &["compute"], "alice"))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::OutputLeakage));
}

#[tokio::test]
async fn unknown_capability_always_yields_security_violation() {
    let h = harness(SandboxConfig::default());
    let record = h
        .engine
        .submit(request("emit hi", &["compute", "memory", "teleport"], "alice"))
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::SecurityViolation);
    assert!(record
        .violations
        .iter()
        .any(|v| v.kind == ViolationKind::UnknownCapability));
}

#[tokio::test]
async fn ledger_holds_every_finalized_record() {
    let h = harness(SandboxConfig::default());
    let completed = h
        .engine
        .submit(request("emit hi", &["compute"], "alice"))
        .await
        .unwrap();
    let rejected = h
        .engine
        .submit(request("emit hi", &["network"], "alice"))
        .await
        .unwrap();

    let stored = h.engine.execution(completed.id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::Completed);
    let stored = h.engine.execution(rejected.id).await.unwrap();
    assert_eq!(stored.status, ExecutionStatus::SecurityViolation);
    assert_eq!(h.engine.executions().await.len(), 2);
}

#[tokio::test]
async fn lifecycle_events_reach_subscribers() {
    let h = harness(SandboxConfig::default());
    let mut events = h.engine.subscribe();

    let signature = h.sign_grant(Capability::Network);
    let exception_id = h
        .engine
        .exception_manager()
        .grant(Capability::Network, &signature, None)
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        SandboxEvent::ExceptionGranted {
            exception_id: id,
            capability,
            ..
        } => {
            assert_eq!(id, exception_id);
            assert_eq!(capability, Capability::Network);
        }
        other => panic!("expected grant event, got {other:?}"),
    }

    let record = h
        .engine
        .submit(request("emit hi", &["compute"], "alice"))
        .await
        .unwrap();
    match events.recv().await.unwrap() {
        SandboxEvent::ExecutionFinalized {
            execution_id,
            status,
            violation_count,
            ..
        } => {
            assert_eq!(execution_id, record.id);
            assert_eq!(status, ExecutionStatus::Completed);
            assert_eq!(violation_count, 0);
        }
        other => panic!("expected finalize event, got {other:?}"),
    }

    h.engine
        .exception_manager()
        .revoke(exception_id)
        .await
        .unwrap();
    match events.recv().await.unwrap() {
        SandboxEvent::ExceptionRevoked {
            exception_id: id, ..
        } => assert_eq!(id, exception_id),
        other => panic!("expected revoke event, got {other:?}"),
    }
}

#[tokio::test]
async fn revoked_exception_stops_authorizing_runs() {
    let config = SandboxConfig {
        rate_ceiling: 100,
        ..Default::default()
    };
    let h = harness(config);
    let signature = h.sign_grant(Capability::Filesystem);
    let exception_id = h
        .engine
        .exception_manager()
        .grant(Capability::Filesystem, &signature, None)
        .await
        .unwrap();

    let before = h
        .engine
        .submit(request("read /data/in.txt", &["filesystem"], "alice"))
        .await
        .unwrap();
    assert_eq!(before.status, ExecutionStatus::Completed);

    h.engine
        .exception_manager()
        .revoke(exception_id)
        .await
        .unwrap();

    let after = h
        .engine
        .submit(request("read /data/in.txt", &["filesystem"], "alice"))
        .await
        .unwrap();
    assert_eq!(after.status, ExecutionStatus::SecurityViolation);
}

// Property: granted ⊆ allow-set ∪ valid exceptions, under concurrency.
#[tokio::test]
async fn concurrent_submissions_never_exceed_exception_ceiling() {
    let config = SandboxConfig {
        rate_ceiling: 1000,
        ..Default::default()
    };
    let h = harness(config);
    let signature = h.sign_grant(Capability::Network);
    h.engine
        .exception_manager()
        .grant(Capability::Network, &signature, None)
        .await
        .unwrap();

    let engine = Arc::new(h.engine);
    let mut handles = Vec::new();
    for i in 0..25 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .submit(request("emit hi", &["network"], &format!("src-{i}")))
                .await
                .unwrap()
        }));
    }

    let mut granted_runs = 0;
    for handle in handles {
        let record = handle.await.unwrap();
        match record.status {
            ExecutionStatus::Completed => {
                assert!(record.granted.contains(&Capability::Network));
                granted_runs += 1;
            }
            ExecutionStatus::SecurityViolation => {
                assert!(record
                    .violations
                    .iter()
                    .any(|v| v.kind == ViolationKind::CapabilityNotGranted));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }
    // Ceiling is 10: exactly ten runs may consume the exception.
    assert_eq!(granted_runs, 10);
}

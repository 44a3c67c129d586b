// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Static Vetting Analyzer
//!
//! Pre-execution vetting: `submitted → pre_checking →
//! {security_violation, capability_resolved}`. All four checks run
//! unconditionally and accumulate violations; the run proceeds only if
//! the final list is empty.
//!
//! For WebAssembly payloads the primary control is structural: the
//! import section is walked and gated host facilities are flagged.
//! Text payloads (and malformed wasm) fall back to the signature
//! catalogue, a best-effort supplement.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::capability::{CapabilityClass, CapabilityPolicy};
use crate::domain::config::SandboxConfig;
use crate::domain::exception::ExceptionId;
use crate::domain::execution::ExecutionRequest;
use crate::domain::ledger::ExecutionLedger;
use crate::domain::violation::{SecurityViolation, Severity, ViolationKind};

use super::exceptions::CapabilityExceptionManager;

/// Outcome of pre-execution vetting: the accumulated violations plus
/// the resolved grant set (meaningful only when `violations` is empty).
#[derive(Debug)]
pub struct VettingReport {
    pub violations: Vec<SecurityViolation>,
    pub granted: BTreeSet<crate::domain::capability::Capability>,
    /// Exceptions whose usage counters were consumed during resolution.
    pub consumed_exceptions: Vec<ExceptionId>,
}

impl VettingReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

struct ThreatSignature {
    pattern: Regex,
    kind: ViolationKind,
    severity: Severity,
    label: &'static str,
}

fn signature_catalogue() -> Result<Vec<ThreatSignature>, regex::Error> {
    let entries: [(&str, ViolationKind, Severity, &str); 7] = [
        (
            r"(?i)\beval\s*\(",
            ViolationKind::CodeInjectionRisk,
            Severity::High,
            "dynamic code evaluation (eval)",
        ),
        (
            r"new\s+Function\s*\(",
            ViolationKind::CodeInjectionRisk,
            Severity::High,
            "dynamic code evaluation (Function constructor)",
        ),
        (
            r#"(?i)\brequire\s*\(\s*["'](?:fs|net|http|https|child_process|os)["']"#,
            ViolationKind::ForbiddenImport,
            Severity::High,
            "host facility import (require)",
        ),
        (
            r"(?im)^\s*import\s+(?:os|socket|subprocess|ctypes)\b",
            ViolationKind::ForbiddenImport,
            Severity::High,
            "host facility import",
        ),
        (
            r"process\.binding",
            ViolationKind::ForbiddenImport,
            Severity::High,
            "raw host binding access",
        ),
        (
            r"(?i)\b(?:malloc|mmap)\s*\(",
            ViolationKind::UnsafeMemoryAccess,
            Severity::Medium,
            "raw memory allocation",
        ),
        (
            r"\balloc\s+\d{9,}\b",
            ViolationKind::UnsafeMemoryAccess,
            Severity::Medium,
            "oversized allocation request",
        ),
    ];
    entries
        .into_iter()
        .map(|(pattern, kind, severity, label)| {
            Ok(ThreatSignature {
                pattern: Regex::new(pattern)?,
                kind,
                severity,
                label,
            })
        })
        .collect()
}

pub struct StaticVettingAnalyzer {
    policy: CapabilityPolicy,
    exceptions: Arc<CapabilityExceptionManager>,
    ledger: Arc<dyn ExecutionLedger>,
    catalogue: Vec<ThreatSignature>,
    max_module_bytes: usize,
    rate_window: chrono::Duration,
    rate_ceiling: usize,
}

impl StaticVettingAnalyzer {
    pub fn new(
        policy: CapabilityPolicy,
        exceptions: Arc<CapabilityExceptionManager>,
        ledger: Arc<dyn ExecutionLedger>,
        config: &SandboxConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            policy,
            exceptions,
            ledger,
            catalogue: signature_catalogue()?,
            max_module_bytes: config.max_module_bytes,
            rate_window: chrono::Duration::from_std(config.rate_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            rate_ceiling: config.rate_ceiling,
        })
    }

    /// Run every pre-check and resolve the requested capability set.
    pub async fn analyze(&self, request: &ExecutionRequest) -> VettingReport {
        let mut violations = Vec::new();

        // 1. Size check.
        if request.module.len() > self.max_module_bytes {
            violations.push(SecurityViolation::new(
                ViolationKind::CodeSizeExceeded,
                Severity::High,
                format!(
                    "module is {} bytes, ceiling is {}",
                    request.module.len(),
                    self.max_module_bytes
                ),
            ));
        }

        // 2. Threat scan.
        violations.extend(self.scan_module(&request.module));

        // 3. Capability resolution.
        let mut granted = BTreeSet::new();
        let mut consumed_exceptions = Vec::new();
        let mut seen = BTreeSet::new();
        for name in &request.requested {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.policy.classify(name) {
                CapabilityClass::Allowed(cap) => {
                    granted.insert(cap);
                }
                CapabilityClass::Blocked(cap) => match self.exceptions.resolve(cap).await {
                    Some(exception_id) => {
                        debug!(capability = %cap, %exception_id, "blocked capability granted via exception");
                        granted.insert(cap);
                        consumed_exceptions.push(exception_id);
                    }
                    None => {
                        violations.push(SecurityViolation::new(
                            ViolationKind::CapabilityNotGranted,
                            Severity::Medium,
                            format!("no valid exception for blocked capability '{cap}'"),
                        ));
                    }
                },
                CapabilityClass::Unknown(name) => {
                    violations.push(SecurityViolation::new(
                        ViolationKind::UnknownCapability,
                        Severity::Low,
                        format!("capability '{name}' is not in the vocabulary"),
                    ));
                }
            }
        }

        // 4. Execution-frequency check.
        let window_start = chrono::Utc::now() - self.rate_window;
        let recent = self
            .ledger
            .count_for_source_since(&request.source, window_start)
            .await;
        if recent >= self.rate_ceiling {
            violations.push(SecurityViolation::new(
                ViolationKind::ExecutionFrequencyExceeded,
                Severity::Medium,
                format!(
                    "source '{}' ran {recent} executions in the last {}s (ceiling {})",
                    request.source,
                    self.rate_window.num_seconds(),
                    self.rate_ceiling
                ),
            ));
        }

        if !violations.is_empty() {
            warn!(
                source = %request.source,
                count = violations.len(),
                "pre-execution vetting rejected module"
            );
        }
        VettingReport {
            violations,
            granted,
            consumed_exceptions,
        }
    }

    fn scan_module(&self, module: &[u8]) -> Vec<SecurityViolation> {
        if module.starts_with(b"\0asm") {
            if let Some(violations) = scan_wasm_imports(module) {
                return violations;
            }
            // Malformed wasm: fall through to the text scan.
        }
        let text = String::from_utf8_lossy(module);
        self.catalogue
            .iter()
            .filter(|sig| sig.pattern.is_match(&text))
            .map(|sig| SecurityViolation::new(sig.kind, sig.severity, sig.label))
            .collect()
    }
}

/// Walk a wasm binary's import section and flag gated host facilities.
/// Returns `None` when the binary cannot be parsed.
fn scan_wasm_imports(module: &[u8]) -> Option<Vec<SecurityViolation>> {
    let mut violations = Vec::new();
    // Header: magic + version.
    if module.len() < 8 {
        return None;
    }
    let mut cursor = Cursor {
        bytes: &module[8..],
        pos: 0,
    };

    while let Some(section_id) = cursor.read_byte() {
        let section_len = cursor.read_leb_u32()? as usize;
        if section_id != 2 {
            cursor.skip(section_len)?;
            continue;
        }
        let import_count = cursor.read_leb_u32()?;
        for _ in 0..import_count {
            let module_name = cursor.read_name()?;
            let field_name = cursor.read_name()?;
            if let Some(violation) = classify_import(&module_name, &field_name) {
                violations.push(violation);
            }
            cursor.skip_import_descriptor()?;
        }
        // Later sections carry no imports.
        break;
    }
    Some(violations)
}

fn classify_import(module_name: &str, field_name: &str) -> Option<SecurityViolation> {
    let facility = if field_name.starts_with("fd_") || field_name.starts_with("path_") {
        Some("filesystem")
    } else if field_name.starts_with("sock_") {
        Some("network")
    } else if field_name.starts_with("proc_") {
        Some("process")
    } else {
        None
    };
    if module_name.starts_with("wasi") {
        if let Some(facility) = facility {
            return Some(SecurityViolation::new(
                ViolationKind::ForbiddenImport,
                Severity::High,
                format!("wasm import {module_name}.{field_name} exposes host {facility}"),
            ));
        }
    }
    if matches!(field_name, "eval" | "system" | "dlopen") {
        return Some(SecurityViolation::new(
            ViolationKind::CodeInjectionRisk,
            Severity::High,
            format!("wasm import {module_name}.{field_name} enables dynamic code execution"),
        ));
    }
    None
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_byte(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_leb_u32(&mut self) -> Option<u32> {
        let mut result: u32 = 0;
        for shift in (0u32..35).step_by(7) {
            let byte = self.read_byte()?;
            result |= u32::from(byte & 0x7f).checked_shl(shift)?;
            if byte & 0x80 == 0 {
                return Some(result);
            }
        }
        None
    }

    fn read_name(&mut self) -> Option<String> {
        let len = self.read_leb_u32()? as usize;
        let end = self.pos.checked_add(len)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        String::from_utf8(slice.to_vec()).ok()
    }

    fn skip(&mut self, len: usize) -> Option<()> {
        let end = self.pos.checked_add(len)?;
        if end > self.bytes.len() {
            return None;
        }
        self.pos = end;
        Some(())
    }

    fn skip_import_descriptor(&mut self) -> Option<()> {
        match self.read_byte()? {
            // func: type index
            0x00 => {
                self.read_leb_u32()?;
            }
            // table: reftype + limits
            0x01 => {
                self.read_byte()?;
                self.skip_limits()?;
            }
            // memory: limits
            0x02 => {
                self.skip_limits()?;
            }
            // global: valtype + mutability
            0x03 => {
                self.read_byte()?;
                self.read_byte()?;
            }
            _ => return None,
        }
        Some(())
    }

    fn skip_limits(&mut self) -> Option<()> {
        let flags = self.read_byte()?;
        self.read_leb_u32()?;
        if flags & 0x01 != 0 {
            self.read_leb_u32()?;
        }
        Some(())
    }
}

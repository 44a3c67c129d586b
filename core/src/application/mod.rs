// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod auditor;
pub mod engine;
pub mod exceptions;
pub mod keyring;
pub mod vetting;

pub use auditor::PostExecutionAuditor;
pub use engine::SandboxEngine;
pub use exceptions::CapabilityExceptionManager;
pub use keyring::AuthorityKeyring;
pub use vetting::{StaticVettingAnalyzer, VettingReport};

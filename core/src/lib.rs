// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Warden Core
//!
//! Capability-gated sandbox execution engine. Untrusted modules run
//! under a default-deny, no-egress policy; blocked capabilities are
//! unlocked only by Ed25519-signed, time- and usage-bounded exceptions
//! issued by a governing authority.
//!
//! # Architecture
//!
//! - **domain** — value objects, aggregates, boundary traits, errors
//! - **application** — vetting, exception management, the engine, audit
//! - **infrastructure** — in-memory ledger, event bus, reference backend

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

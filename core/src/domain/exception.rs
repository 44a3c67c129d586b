// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Exception
//!
//! A time- and usage-bounded authorization for a normally-blocked
//! capability, created only after the governing authority's signature
//! verifies. Owned exclusively by the exception store; executions never
//! hold a reference beyond the duration of their run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::capability::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExceptionId(pub Uuid);

impl ExceptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExceptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExceptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Grants one blocked capability for a bounded window.
///
/// An exception becomes unusable when its usage counter reaches the
/// ceiling, when its expiry passes, or when it is revoked — whichever
/// comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityException {
    pub id: ExceptionId,
    pub capability: Capability,
    /// Base64 Ed25519 signature the grant was issued under, kept for audit.
    pub signature: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub uses: u32,
    pub max_uses: u32,
    pub active: bool,
}

impl CapabilityException {
    pub fn new(
        capability: Capability,
        signature: String,
        expires_at: DateTime<Utc>,
        max_uses: u32,
    ) -> Self {
        Self {
            id: ExceptionId::new(),
            capability,
            signature,
            issued_at: Utc::now(),
            expires_at,
            uses: 0,
            max_uses,
            active: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this exception can authorize one more use at `now`.
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now) && self.uses < self.max_uses
    }

    /// Consume one use. Callers must hold the store lock across the
    /// `usable_at` check and this call (the atomicity contract lives in
    /// the exception manager).
    pub fn consume(&mut self) {
        debug_assert!(self.uses < self.max_uses);
        self.uses += 1;
    }

    pub fn revoke(&mut self) {
        self.active = false;
    }
}

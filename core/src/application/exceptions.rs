// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Exception Manager
//!
//! Creates, revokes, and resolves [`CapabilityException`]s. The store
//! sits behind a single mutex so that `resolve` — lookup of a valid
//! exception plus its usage-counter increment — is one critical
//! section. Two concurrent executions can never both observe the last
//! remaining use of an exception.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::capability::Capability;
use crate::domain::config::SandboxConfig;
use crate::domain::events::SandboxEvent;
use crate::domain::exception::{CapabilityException, ExceptionId};
use crate::domain::execution::SandboxError;
use crate::infrastructure::event_bus::EventBus;

use super::keyring::AuthorityKeyring;

pub struct CapabilityExceptionManager {
    keyring: AuthorityKeyring,
    store: Mutex<HashMap<ExceptionId, CapabilityException>>,
    events: EventBus,
    default_ttl: chrono::Duration,
    max_uses: u32,
}

impl CapabilityExceptionManager {
    pub fn new(keyring: AuthorityKeyring, config: &SandboxConfig, events: EventBus) -> Self {
        Self {
            keyring,
            store: Mutex::new(HashMap::new()),
            events,
            default_ttl: chrono::Duration::from_std(config.exception_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
            max_uses: config.exception_max_uses,
        }
    }

    /// Verify the authority signature and create a new exception for a
    /// blocked capability.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` if no registered authority key verifies the
    /// grant message for `capability`.
    pub async fn grant(
        &self,
        capability: Capability,
        signature_b64: &str,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<ExceptionId, SandboxError> {
        self.keyring.verify_grant(capability, signature_b64)?;

        let expires_at = expires_at.unwrap_or_else(|| Utc::now() + self.default_ttl);
        let exception = CapabilityException::new(
            capability,
            signature_b64.to_string(),
            expires_at,
            self.max_uses,
        );
        let id = exception.id;

        info!(exception_id = %id, capability = %capability, %expires_at, "capability exception granted");
        self.store.lock().await.insert(id, exception);
        self.events.publish(SandboxEvent::ExceptionGranted {
            exception_id: id,
            capability,
            expires_at,
            at: Utc::now(),
        });
        Ok(id)
    }

    /// Clear the active flag. Revoking an already-inactive exception is
    /// a no-op success; an unknown id is `ExceptionNotFound`.
    pub async fn revoke(&self, id: ExceptionId) -> Result<(), SandboxError> {
        let mut store = self.store.lock().await;
        let exception = store
            .get_mut(&id)
            .ok_or(SandboxError::ExceptionNotFound(id))?;
        if exception.active {
            exception.revoke();
            warn!(exception_id = %id, capability = %exception.capability, "capability exception revoked");
            self.events.publish(SandboxEvent::ExceptionRevoked {
                exception_id: id,
                at: Utc::now(),
            });
        }
        Ok(())
    }

    /// Find the first currently-valid exception for `capability` and
    /// consume one use, atomically. Returns the consumed exception's id
    /// or `None` when no valid exception exists.
    pub async fn resolve(&self, capability: Capability) -> Option<ExceptionId> {
        let now = Utc::now();
        let mut store = self.store.lock().await;
        let exception = store
            .values_mut()
            .filter(|e| e.capability == capability && e.usable_at(now))
            .min_by_key(|e| e.issued_at)?;
        exception.consume();
        Some(exception.id)
    }

    pub async fn find(&self, id: ExceptionId) -> Option<CapabilityException> {
        self.store.lock().await.get(&id).cloned()
    }

    /// Read-only snapshot for the audit query surface.
    pub async fn list(&self) -> Vec<CapabilityException> {
        let mut all: Vec<_> = self.store.lock().await.values().cloned().collect();
        all.sort_by_key(|e| e.issued_at);
        all
    }
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Capability Vocabulary & Policy
//!
//! A [`Capability`] is a named permission a sandboxed module may be
//! granted. The vocabulary is closed: anything outside it is rejected
//! as unknown at the vetting layer, regardless of exceptions.
//!
//! The [`CapabilityPolicy`] partitions the vocabulary at configuration
//! time into an allow-set (always available) and a block-set (requires
//! a signed exception). It is pure data and never mutated at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A named permission from the fixed sandbox vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Compute,
    Memory,
    Network,
    Filesystem,
    Process,
    System,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Compute => "compute",
            Capability::Memory => "memory",
            Capability::Network => "network",
            Capability::Filesystem => "filesystem",
            Capability::Process => "process",
            Capability::System => "system",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`Capability::from_str`] for names outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compute" => Ok(Capability::Compute),
            "memory" => Ok(Capability::Memory),
            "network" => Ok(Capability::Network),
            "filesystem" => Ok(Capability::Filesystem),
            "process" => Ok(Capability::Process),
            "system" => Ok(Capability::System),
            other => Err(UnknownCapability(other.to_string())),
        }
    }
}

/// Classification of a requested capability name against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityClass {
    /// Always available; granted without an exception.
    Allowed(Capability),
    /// Requires a currently-valid signed exception.
    Blocked(Capability),
    /// Outside the vocabulary; always rejected.
    Unknown(String),
}

/// Static allow/block partition of the capability vocabulary.
///
/// Deny-by-default: a capability absent from both sets is treated as
/// blocked, so a misconfigured partition can never widen access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    allowed: BTreeSet<Capability>,
    blocked: BTreeSet<Capability>,
}

impl CapabilityPolicy {
    pub fn new(
        allowed: impl IntoIterator<Item = Capability>,
        blocked: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            blocked: blocked.into_iter().collect(),
        }
    }

    /// Classify a requested capability name.
    ///
    /// Names that parse but fall outside both sets classify as
    /// `Blocked` rather than `Allowed`.
    pub fn classify(&self, name: &str) -> CapabilityClass {
        match Capability::from_str(name) {
            Ok(cap) if self.allowed.contains(&cap) => CapabilityClass::Allowed(cap),
            Ok(cap) => CapabilityClass::Blocked(cap),
            Err(UnknownCapability(name)) => CapabilityClass::Unknown(name),
        }
    }

    pub fn is_allowed(&self, cap: Capability) -> bool {
        self.allowed.contains(&cap)
    }
}

impl Default for CapabilityPolicy {
    /// The no-egress posture: pure computation and working memory are
    /// free; every capability with a real-world side effect is gated.
    fn default() -> Self {
        Self::new(
            [Capability::Compute, Capability::Memory],
            [
                Capability::Network,
                Capability::Filesystem,
                Capability::Process,
                Capability::System,
            ],
        )
    }
}

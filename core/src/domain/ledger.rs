// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::execution::{ExecutionId, ExecutionRecord};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Appending a record whose id is already present would rewrite
    /// history; the ledger refuses.
    #[error("record {0} already appended")]
    DuplicateRecord(ExecutionId),

    /// Only terminal records may be appended.
    #[error("record {0} is not in a terminal status")]
    NotTerminal(ExecutionId),
}

/// Append-only history of execution lifecycles.
///
/// Used both for external audit queries and for the analyzer's
/// execution-frequency checks. Durability is an implementation
/// concern: the in-memory ledger lives for the process lifetime.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Atomically append one terminal record. No record is ever
    /// deleted or rewritten afterwards.
    async fn append(&self, record: ExecutionRecord) -> Result<(), LedgerError>;

    async fn find_by_id(&self, id: ExecutionId) -> Option<ExecutionRecord>;

    async fn list(&self) -> Vec<ExecutionRecord>;

    /// Number of records from `source` whose run started at or after
    /// `since`. Counts every lifecycle, including rejected ones.
    async fn count_for_source_since(&self, source: &str, since: DateTime<Utc>) -> usize;
}

// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::execution::{ExecutionId, ExecutionRecord};
use crate::domain::ledger::{ExecutionLedger, LedgerError};

/// Process-lifetime, append-only ledger. The inner vector is only ever
/// pushed to; the id index exists for O(1) audit lookups.
pub struct InMemoryExecutionLedger {
    inner: Arc<RwLock<LedgerState>>,
}

#[derive(Default)]
struct LedgerState {
    records: Vec<ExecutionRecord>,
    by_id: HashMap<ExecutionId, usize>,
}

impl InMemoryExecutionLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(LedgerState::default())),
        }
    }
}

impl Default for InMemoryExecutionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionLedger for InMemoryExecutionLedger {
    async fn append(&self, record: ExecutionRecord) -> Result<(), LedgerError> {
        if !record.status.is_terminal() {
            return Err(LedgerError::NotTerminal(record.id));
        }
        let mut state = self.inner.write().await;
        if state.by_id.contains_key(&record.id) {
            return Err(LedgerError::DuplicateRecord(record.id));
        }
        let index = state.records.len();
        state.by_id.insert(record.id, index);
        state.records.push(record);
        Ok(())
    }

    async fn find_by_id(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        let state = self.inner.read().await;
        state.by_id.get(&id).map(|&i| state.records[i].clone())
    }

    async fn list(&self) -> Vec<ExecutionRecord> {
        self.inner.read().await.records.clone()
    }

    async fn count_for_source_since(&self, source: &str, since: DateTime<Utc>) -> usize {
        let state = self.inner.read().await;
        state
            .records
            .iter()
            .filter(|r| r.source == source && r.started_at >= since)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionRequest;

    fn terminal_record(source: &str) -> ExecutionRecord {
        let mut record =
            ExecutionRecord::new(&ExecutionRequest::new(b"emit x".to_vec(), ["compute"], source));
        record.begin_pre_check();
        record.reject(Vec::new());
        record
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let ledger = InMemoryExecutionLedger::new();
        let record = terminal_record("src-a");
        let id = record.id;
        ledger.append(record).await.unwrap();
        assert_eq!(ledger.find_by_id(id).await.unwrap().id, id);
        assert!(ledger.find_by_id(ExecutionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_append_is_refused() {
        let ledger = InMemoryExecutionLedger::new();
        let record = terminal_record("src-a");
        ledger.append(record.clone()).await.unwrap();
        assert!(matches!(
            ledger.append(record).await,
            Err(LedgerError::DuplicateRecord(_))
        ));
        assert_eq!(ledger.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_non_terminal_append_is_refused() {
        let ledger = InMemoryExecutionLedger::new();
        let record =
            ExecutionRecord::new(&ExecutionRequest::new(b"emit x".to_vec(), ["compute"], "s"));
        assert!(matches!(
            ledger.append(record).await,
            Err(LedgerError::NotTerminal(_))
        ));
    }

    #[tokio::test]
    async fn test_count_for_source_since_filters_by_source() {
        let ledger = InMemoryExecutionLedger::new();
        for _ in 0..3 {
            ledger.append(terminal_record("src-a")).await.unwrap();
        }
        ledger.append(terminal_record("src-b")).await.unwrap();

        let window_start = Utc::now() - chrono::Duration::seconds(60);
        assert_eq!(ledger.count_for_source_since("src-a", window_start).await, 3);
        assert_eq!(ledger.count_for_source_since("src-b", window_start).await, 1);
        assert_eq!(ledger.count_for_source_since("src-c", window_start).await, 0);
        assert_eq!(
            ledger.count_for_source_since("src-a", Utc::now() + chrono::Duration::seconds(5)).await,
            0
        );
    }
}

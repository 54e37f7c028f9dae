use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{NewOutboxRecord, OutboxJournal, OutboxRecord, PendingQuery, Result, StoreError};

#[derive(Debug, Default)]
struct JournalState {
    records: Vec<OutboxRecord>,
    next_id: i64,
    fail_on_fetch: bool,
}

/// In-memory outbox journal for tests and local runs.
///
/// Clones share the same records, so a repository and a poller can be
/// handed separate clones of one journal.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutboxJournal {
    state: Arc<RwLock<JournalState>>,
}

impl InMemoryOutboxJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends records and returns them with their assigned ids.
    ///
    /// Repositories call this while holding their own write lock, which is
    /// what makes the state change and the journal entry land together.
    pub async fn append(&self, records: Vec<NewOutboxRecord>) -> Vec<OutboxRecord> {
        let mut state = self.state.write().await;
        let mut appended = Vec::with_capacity(records.len());
        for record in records {
            state.next_id += 1;
            let record = record.into_record(state.next_id);
            state.records.push(record.clone());
            appended.push(record);
        }
        metrics::counter!("outbox_records_journaled_total").increment(appended.len() as u64);
        appended
    }

    /// Snapshot of every record, processed or not, in append order.
    pub async fn records(&self) -> Vec<OutboxRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Makes every subsequent fetch and count fail until reset.
    pub async fn set_fail_on_fetch(&self, fail: bool) {
        self.state.write().await.fail_on_fetch = fail;
    }

    pub async fn clear(&self) {
        self.state.write().await.records.clear();
    }
}

#[async_trait]
impl OutboxJournal for InMemoryOutboxJournal {
    async fn fetch_unprocessed(&self, query: PendingQuery) -> Result<Vec<OutboxRecord>> {
        let state = self.state.read().await;
        if state.fail_on_fetch {
            return Err(StoreError::Unavailable("journal fetch disabled".to_string()));
        }

        let mut pending: Vec<OutboxRecord> = state
            .records
            .iter()
            .filter(|r| query.admits(r))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    async fn mark_processed(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.processed => {
                record.processed = true;
                record.processed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<i32> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::Unavailable(format!("outbox record {id} not found")))?;
        record.attempts += 1;
        record.last_error = Some(error.to_string());
        Ok(record.attempts)
    }

    async fn pending_count(&self) -> Result<u64> {
        let state = self.state.read().await;
        if state.fail_on_fetch {
            return Err(StoreError::Unavailable("journal fetch disabled".to_string()));
        }
        Ok(state.records.iter().filter(|r| !r.processed).count() as u64)
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.records.len();
        state
            .records
            .retain(|r| !(r.processed && r.created_at < older_than));
        Ok((before - state.records.len()) as u64)
    }
}

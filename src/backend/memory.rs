//! In-memory market store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::store::{now_millis, MarketStore, RECENT_LIMIT};
use super::types::MarketRecord;
use crate::error::BackendError;

#[derive(Debug, Clone)]
struct StoredRow {
    record: MarketRecord,
    seq: u64,
}

/// DashMap-backed [`MarketStore`] for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct InMemoryMarketStore {
    rows: DashMap<String, StoredRow>,
    seq: AtomicU64,
}

impl InMemoryMarketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove a row. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn upsert(&self, record: &MarketRecord) -> Result<(), BackendError> {
        if !record.is_complete() {
            return Err(BackendError::InvalidRecord(
                "id, team1 and team2 are required".to_string(),
            ));
        }

        let mut record = record.clone();
        record.created_at = Some(now_millis());
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        debug!(id = %record.id, seq, "Storing market record");
        self.rows.insert(record.id.clone(), StoredRow { record, seq });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<MarketRecord>, BackendError> {
        Ok(self.rows.get(id).map(|row| row.record.clone()))
    }

    async fn find_by_match(
        &self,
        team1: &str,
        team2: &str,
        match_start_time: i64,
    ) -> Result<Option<MarketRecord>, BackendError> {
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                row.record.team1 == team1
                    && row.record.team2 == team2
                    && row.record.match_start_time == Some(match_start_time)
            })
            .min_by_key(|row| row.seq)
            .map(|row| row.record.clone()))
    }

    async fn recent(&self) -> Result<Vec<MarketRecord>, BackendError> {
        let mut rows: Vec<StoredRow> = self.rows.iter().map(|row| row.clone()).collect();
        rows.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|row| row.record)
            .collect())
    }
}

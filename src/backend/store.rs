//! Persistence store seam.

use async_trait::async_trait;
use time::OffsetDateTime;

use super::types::MarketRecord;
use crate::error::BackendError;

/// Number of rows returned by [`MarketStore::recent`].
pub const RECENT_LIMIT: usize = 100;

/// Current time in unix milliseconds, as stamped into `createdAt`.
pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Key-value store of market metadata.
///
/// The chain stays the source of truth; this is a lookup cache.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Insert or replace a row by id.
    async fn upsert(&self, record: &MarketRecord) -> Result<(), BackendError>;

    /// Fetch one row by id.
    async fn get(&self, id: &str) -> Result<Option<MarketRecord>, BackendError>;

    /// Fetch the row matching all three fields exactly.
    async fn find_by_match(
        &self,
        team1: &str,
        team2: &str,
        match_start_time: i64,
    ) -> Result<Option<MarketRecord>, BackendError>;

    /// The most recent rows, newest first.
    async fn recent(&self) -> Result<Vec<MarketRecord>, BackendError>;
}

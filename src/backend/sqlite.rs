//! SQLite-backed market store.
//!
//! Keeps the persistence shim's `markets` table on disk so rows survive a
//! restart. Replacing a row gives it a fresh rowid, which breaks `createdAt`
//! ties in favour of the newest write.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use super::store::{now_millis, MarketStore, RECENT_LIMIT};
use super::types::MarketRecord;
use crate::error::BackendError;

/// [`MarketStore`] over a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteMarketStore {
    pool: SqlitePool,
}

impl SqliteMarketStore {
    /// Open (or create) the database at `path` and make sure the table exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(path = %path.display(), rows = store.len().await?, "Opened market database");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), BackendError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS markets (
                id TEXT PRIMARY KEY,
                address TEXT,
                team1 TEXT,
                team2 TEXT,
                image TEXT,
                matchStartTime INTEGER,
                fromBlock INTEGER,
                createdAt INTEGER,
                marketTerms TEXT,
                leagueName TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_markets_match ON markets(team1, team2, matchStartTime)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of rows.
    pub async fn len(&self) -> Result<usize, BackendError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM markets")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len().await? == 0)
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> Result<MarketRecord, sqlx::Error> {
    Ok(MarketRecord {
        id: row.try_get("id")?,
        address: row.try_get("address")?,
        team1: row.try_get::<Option<String>, _>("team1")?.unwrap_or_default(),
        team2: row.try_get::<Option<String>, _>("team2")?.unwrap_or_default(),
        image: row.try_get("image")?,
        match_start_time: row.try_get("matchStartTime")?,
        from_block: row
            .try_get::<Option<i64>, _>("fromBlock")?
            .and_then(|block| u64::try_from(block).ok()),
        created_at: row.try_get("createdAt")?,
        market_terms: row.try_get("marketTerms")?,
        league_name: row.try_get("leagueName")?,
    })
}

#[async_trait]
impl MarketStore for SqliteMarketStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn upsert(&self, record: &MarketRecord) -> Result<(), BackendError> {
        if !record.is_complete() {
            return Err(BackendError::InvalidRecord(
                "id, team1 and team2 are required".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO markets (
                id, address, team1, team2, image, matchStartTime,
                fromBlock, createdAt, marketTerms, leagueName
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.address.as_deref())
        .bind(&record.team1)
        .bind(&record.team2)
        .bind(record.image.as_deref())
        .bind(record.match_start_time)
        .bind(record.from_block.and_then(|block| i64::try_from(block).ok()))
        .bind(now_millis())
        .bind(record.market_terms.as_deref())
        .bind(record.league_name.as_deref())
        .execute(&self.pool)
        .await?;

        debug!("Market record written");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<MarketRecord>, BackendError> {
        let row = sqlx::query("SELECT * FROM markets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn find_by_match(
        &self,
        team1: &str,
        team2: &str,
        match_start_time: i64,
    ) -> Result<Option<MarketRecord>, BackendError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM markets
            WHERE team1 = ? AND team2 = ? AND matchStartTime = ?
            ORDER BY rowid ASC
            LIMIT 1
            "#,
        )
        .bind(team1)
        .bind(team2)
        .bind(match_start_time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn recent(&self) -> Result<Vec<MarketRecord>, BackendError> {
        let rows = sqlx::query("SELECT * FROM markets ORDER BY createdAt DESC, rowid DESC LIMIT ?")
            .bind(RECENT_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

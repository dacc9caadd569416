//! REST client for the persistence store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::store::MarketStore;
use super::types::MarketRecord;
use crate::error::BackendError;
use crate::metrics;

/// Error body returned by the store.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the persistence store's `/markets` endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client for `base_url` (e.g. `http://localhost:4000/api`).
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| BackendError::Parse(format!("invalid backend url {base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(2))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn markets_url(&self, id: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::Parse(format!("{} cannot be a base", self.base_url)))?;
            segments.pop_if_empty().push("markets");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Read a JSON body, mapping 404 to `None` and other failures to errors.
    async fn read_optional<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, BackendError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }
        let body = response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(Some(body))
    }

    async fn status_error(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        BackendError::Status { status, message }
    }
}

#[async_trait]
impl MarketStore for BackendClient {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn upsert(&self, record: &MarketRecord) -> Result<(), BackendError> {
        if !record.is_complete() {
            return Err(BackendError::InvalidRecord(
                "id, team1 and team2 are required".to_string(),
            ));
        }

        let start = Instant::now();
        let response = self
            .http
            .post(self.markets_url(None)?)
            .json(record)
            .send()
            .await?;
        metrics::record_http_latency(start, "upsert_market");

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        debug!("Market record persisted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<MarketRecord>, BackendError> {
        let start = Instant::now();
        let response = self.http.get(self.markets_url(Some(id))?).send().await?;
        metrics::record_http_latency(start, "get_market");
        Self::read_optional(response).await
    }

    #[instrument(skip(self))]
    async fn find_by_match(
        &self,
        team1: &str,
        team2: &str,
        match_start_time: i64,
    ) -> Result<Option<MarketRecord>, BackendError> {
        let start_time = match_start_time.to_string();
        let start = Instant::now();
        let response = self
            .http
            .get(self.markets_url(None)?)
            .query(&[
                ("team1", team1),
                ("team2", team2),
                ("matchStartTime", start_time.as_str()),
            ])
            .send()
            .await?;
        metrics::record_http_latency(start, "find_market");
        Self::read_optional(response).await
    }

    #[instrument(skip(self))]
    async fn recent(&self) -> Result<Vec<MarketRecord>, BackendError> {
        let start = Instant::now();
        let response = self.http.get(self.markets_url(None)?).send().await?;
        metrics::record_http_latency(start, "list_markets");

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        response
            .json::<Vec<MarketRecord>>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

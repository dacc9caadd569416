//! HTTP API handlers.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::market::epoch::{countdown_str, epoch_period_label};
use crate::market::{categorize, compute_epoch, Category, Clock, Market, TradingStatus};
use crate::reconciler::{MarketReconciler, ReconcilerStats};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the first backend poll has completed.
    pub ready: Arc<AtomicBool>,
    /// Market table owner.
    pub reconciler: MarketReconciler,
    /// Time source for derived fields.
    pub clock: Arc<dyn Clock>,
    /// Connected wallet, if any.
    pub wallet: Option<Address>,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(reconciler: MarketReconciler, clock: Arc<dyn Clock>) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            reconciler,
            clock,
            wallet: None,
            metrics: None,
        }
    }

    /// Attach the connected wallet.
    pub fn with_wallet(mut self, wallet: Option<Address>) -> Self {
        self.wallet = wallet;
        self
    }

    /// Attach a Prometheus handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Markets currently tracked.
    pub markets: usize,
}

/// Status response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Connected wallet.
    pub wallet: Option<String>,
    /// Reconciler counters.
    pub stats: ReconcilerStats,
}

/// A market with its live epoch state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketView {
    /// The market itself.
    #[serde(flatten)]
    pub market: Market,
    /// Category computed now.
    pub category: Category,
    /// Current epoch.
    pub epoch: Option<u8>,
    /// Trading status.
    pub trading_status: TradingStatus,
    /// Label of the current epoch window.
    pub period: Option<String>,
    /// Time to the next status change.
    pub countdown: String,
}

impl MarketView {
    /// Derive the view of `market` at `now`.
    pub fn at(market: Market, now: i64) -> Self {
        let info = compute_epoch(now, market.match_start_time);
        Self {
            category: categorize(&market, now),
            epoch: info.epoch,
            trading_status: info.status,
            period: info.epoch.and_then(epoch_period_label),
            countdown: countdown_str(now, market.match_start_time),
            market,
        }
    }
}

/// Query of the market list.
#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    /// `live`, `upcoming` or `resolved`; all markets when absent.
    pub category: Option<String>,
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Message.
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        markets: state.reconciler.snapshot().len(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns reconciler statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.reconciler.is_shut_down() {
        "stopped"
    } else if state.is_ready() {
        "running"
    } else {
        "starting"
    };

    Json(StatusResponse {
        status,
        wallet: state.wallet.map(|w| w.to_string()),
        stats: state.reconciler.stats(),
    })
}

/// Market list handler - sorted by start time, optionally filtered.
pub async fn markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> Response {
    let now = state.clock.now();
    let markets = match query.category.as_deref() {
        None | Some("") | Some("all") => state.reconciler.all(),
        Some(raw) => match Category::from_str(raw) {
            Ok(category) => state.reconciler.view(category),
            Err(_) => {
                return error(
                    StatusCode::BAD_REQUEST,
                    format!("unknown category {raw:?}, expected live, upcoming or resolved"),
                )
            }
        },
    };

    let views: Vec<MarketView> = markets
        .into_iter()
        .map(|market| MarketView::at(market, now))
        .collect();
    Json(views).into_response()
}

/// Single market handler.
pub async fn market(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.reconciler.get(&id) {
        Some(market) => Json(MarketView::at(market, state.clock.now())).into_response(),
        None => error(StatusCode::NOT_FOUND, "not found"),
    }
}

/// Prometheus metrics handler.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => error(StatusCode::NOT_FOUND, "metrics recorder not installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryMarketStore;
    use crate::chain::SimulatedChain;
    use crate::market::ManualClock;
    use crate::reconciler::ReconcilerConfig;

    fn test_state(now: i64) -> AppState {
        let clock = Arc::new(ManualClock::new(now));
        let reconciler = MarketReconciler::new(
            ReconcilerConfig::default(),
            Arc::new(InMemoryMarketStore::new()),
            Arc::new(SimulatedChain::new()),
            clock.clone(),
        );
        AppState::new(reconciler, clock)
    }

    #[test]
    fn app_state_ready_toggle() {
        let state = test_state(0);
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn market_view_reports_epoch_state() {
        let now = 1_760_000_000;
        let view = MarketView::at(Market::new("m", "A", "B").with_start_time(now - 20 * 60), now);
        assert_eq!(view.epoch, Some(3));
        assert_eq!(view.trading_status, TradingStatus::Open);
        assert_eq!(view.period.as_deref(), Some("15-30 min"));
        assert_eq!(view.countdown, "10m 0s");
        assert_eq!(view.category, Category::Live);
    }
}

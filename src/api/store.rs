//! Persistence shim: the market store REST server.
//!
//! Serves `/api/markets` over any [`MarketStore`]; the binary backs it with
//! SQLite and tests with the in-memory store.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::backend::{MarketRecord, MarketStore};

/// Shared state of the store router.
pub type StoreState = Arc<dyn MarketStore>;

/// Body of `POST /api/markets`. Everything optional so missing required
/// fields produce a 400 with a message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    id: Option<String>,
    address: Option<String>,
    team1: Option<String>,
    team2: Option<String>,
    image: Option<String>,
    match_start_time: Option<i64>,
    from_block: Option<u64>,
    market_terms: Option<String>,
    league_name: Option<String>,
}

impl UpsertRequest {
    fn into_record(self) -> Option<MarketRecord> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
        let mut record = MarketRecord::new(
            non_empty(self.id)?,
            non_empty(self.team1)?,
            non_empty(self.team2)?,
        );
        record.address = non_empty(self.address);
        record.image = non_empty(self.image);
        record.match_start_time = self.match_start_time.filter(|t| *t != 0);
        record.from_block = self.from_block.filter(|b| *b != 0);
        record.market_terms = non_empty(self.market_terms);
        record.league_name = non_empty(self.league_name);
        Some(record)
    }
}

/// Query of `GET /api/markets`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    team1: Option<String>,
    team2: Option<String>,
    match_start_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
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

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "not found")
}

/// Create or replace a market record.
pub async fn upsert_market(
    State(store): State<StoreState>,
    Json(body): Json<UpsertRequest>,
) -> Response {
    let Some(record) = body.into_record() else {
        return error(StatusCode::BAD_REQUEST, "id, team1 and team2 are required");
    };
    match store.upsert(&record).await {
        Ok(()) => {
            debug!(id = %record.id, "Stored market");
            Json(SuccessResponse { success: true }).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to store market");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Fetch one record by id.
pub async fn get_market(State(store): State<StoreState>, Path(id): Path<String>) -> Response {
    match store.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => not_found(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Exact match lookup when all three query fields are given, else the most
/// recent records.
pub async fn list_markets(
    State(store): State<StoreState>,
    Query(query): Query<MatchQuery>,
) -> Response {
    if let (Some(team1), Some(team2), Some(start)) =
        (&query.team1, &query.team2, &query.match_start_time)
    {
        let Ok(start) = start.trim().parse::<i64>() else {
            return not_found();
        };
        return match store.find_by_match(team1, team2, start).await {
            Ok(Some(record)) => Json(record).into_response(),
            Ok(None) => not_found(),
            Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
    }

    match store.recent().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Create the store router.
pub fn store_router(store: StoreState) -> Router {
    Router::new()
        .route("/api/markets", get(list_markets).post(upsert_market))
        .route("/api/markets/:id", get(get_market))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(store)
}

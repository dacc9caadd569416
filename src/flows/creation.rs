//! Market creation: submit, confirm, extract the new address, persist.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::backend::{MarketRecord, MarketStore, DEFAULT_IMAGE};
use crate::chain::{
    find_market_created, wait_for_receipt, ChainReader, ChainWriter, ConfirmationPolicy,
    CreateMarketCall, TxHandle, TxReceipt,
};
use crate::error::{BackendError, CreationError};
use crate::metrics;

/// User input for a new market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMarketRequest {
    /// Free-text match description.
    pub match_details: String,
    /// Kick-off, unix seconds.
    pub match_start_time: i64,
    /// Home team.
    pub team_a: String,
    /// Away team.
    pub team_b: String,
    /// League, informational only.
    pub league_name: Option<String>,
    /// Display image.
    pub image: Option<String>,
    /// Free-text market terms.
    pub market_terms: Option<String>,
}

impl CreateMarketRequest {
    /// Request with the required fields only.
    pub fn new(
        match_details: impl Into<String>,
        match_start_time: i64,
        team_a: impl Into<String>,
        team_b: impl Into<String>,
    ) -> Self {
        Self {
            match_details: match_details.into(),
            match_start_time,
            team_a: team_a.into(),
            team_b: team_b.into(),
            league_name: None,
            image: None,
            market_terms: None,
        }
    }

    /// Set the league.
    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league_name = Some(league.into());
        self
    }

    /// Check required fields. A missing league only logs a warning.
    pub fn validate(&self) -> Result<(), CreationError> {
        if self.team_a.trim().is_empty() {
            return Err(CreationError::MissingField("team A"));
        }
        if self.team_b.trim().is_empty() {
            return Err(CreationError::MissingField("team B"));
        }
        if self.match_start_time <= 0 {
            return Err(CreationError::InvalidStartTime(self.match_start_time));
        }
        if self.league_name.as_deref().map_or(true, |l| l.trim().is_empty()) {
            warn!(team_a = %self.team_a, team_b = %self.team_b, "Creating market without a league name");
        }
        Ok(())
    }

    fn call(&self) -> CreateMarketCall {
        let match_details = if self.match_details.trim().is_empty() {
            format!("{} vs {}", self.team_a.trim(), self.team_b.trim())
        } else {
            self.match_details.clone()
        };
        CreateMarketCall {
            match_details,
            match_start_time: self.match_start_time,
            team_a: self.team_a.trim().to_string(),
            team_b: self.team_b.trim().to_string(),
        }
    }

    fn record(&self, address: Address, from_block: Option<u64>) -> MarketRecord {
        let address = address.to_string();
        MarketRecord {
            id: address.clone(),
            address: Some(address),
            team1: self.team_a.trim().to_string(),
            team2: self.team_b.trim().to_string(),
            image: Some(self.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string())),
            match_start_time: Some(self.match_start_time),
            from_block,
            created_at: None,
            market_terms: self.market_terms.clone(),
            league_name: self.league_name.clone(),
        }
    }
}

/// Terminal state of a submitted creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationOutcome {
    /// Confirmed and the new address was found.
    Created {
        /// New market contract.
        address: Address,
        /// Confirming block.
        block_number: Option<u64>,
        /// Creation transaction.
        tx: TxHandle,
        /// Whether the backend accepted the record.
        persisted: bool,
    },
    /// Confirmed, but no creation event could be read from the receipt.
    ConfirmedUnresolved {
        /// Creation transaction.
        tx: TxHandle,
    },
    /// Mined and reverted.
    Reverted {
        /// Creation transaction.
        tx: TxHandle,
    },
    /// Submitted, but confirmation could not be observed.
    Unresolved {
        /// Creation transaction.
        tx: TxHandle,
        /// What went wrong while waiting.
        reason: String,
    },
}

impl CreationOutcome {
    /// Creation transaction.
    pub fn tx(&self) -> TxHandle {
        match self {
            CreationOutcome::Created { tx, .. }
            | CreationOutcome::ConfirmedUnresolved { tx }
            | CreationOutcome::Reverted { tx }
            | CreationOutcome::Unresolved { tx, .. } => *tx,
        }
    }

    /// New market address, if recovered.
    pub fn address(&self) -> Option<Address> {
        match self {
            CreationOutcome::Created { address, .. } => Some(*address),
            _ => None,
        }
    }
}

/// A submitted creation still being confirmed in the background.
#[derive(Debug)]
pub struct PendingCreation {
    /// Submitted transaction, available immediately.
    pub tx: TxHandle,
    handle: JoinHandle<CreationOutcome>,
}

impl PendingCreation {
    /// Wait for the background confirmation to finish.
    pub async fn wait(self) -> CreationOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => CreationOutcome::Unresolved {
                tx: self.tx,
                reason: format!("confirmation task failed: {e}"),
            },
        }
    }
}

/// Orchestrates market creation.
#[derive(Clone)]
pub struct MarketCreationFlow {
    writer: Arc<dyn ChainWriter>,
    reader: Arc<dyn ChainReader>,
    store: Arc<dyn MarketStore>,
    policy: ConfirmationPolicy,
}

impl MarketCreationFlow {
    /// Create the flow.
    pub fn new(
        writer: Arc<dyn ChainWriter>,
        reader: Arc<dyn ChainReader>,
        store: Arc<dyn MarketStore>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            writer,
            reader,
            store,
            policy,
        }
    }

    /// Validate and submit. Returns as soon as the transaction is sent;
    /// confirmation continues in the background.
    #[instrument(skip(self, request), fields(team_a = %request.team_a, team_b = %request.team_b))]
    pub async fn submit(
        &self,
        wallet: Option<Address>,
        request: CreateMarketRequest,
    ) -> Result<PendingCreation, CreationError> {
        request.validate()?;
        let wallet = wallet.ok_or(CreationError::WalletNotConnected)?;

        let tx = self
            .writer
            .submit_create_market(wallet, &request.call())
            .await
            .map_err(CreationError::Submission)?;
        info!(%tx, "Market creation submitted");

        let flow = self.clone();
        let handle = tokio::spawn(async move { flow.confirm(tx, &request).await });
        Ok(PendingCreation { tx, handle })
    }

    /// Submit and wait for the outcome.
    pub async fn create_market(
        &self,
        wallet: Option<Address>,
        request: CreateMarketRequest,
    ) -> Result<CreationOutcome, CreationError> {
        Ok(self.submit(wallet, request).await?.wait().await)
    }

    /// Look up a previously persisted market by its match.
    pub async fn find_existing(
        &self,
        team1: &str,
        team2: &str,
        match_start_time: i64,
    ) -> Result<Option<MarketRecord>, BackendError> {
        self.store.find_by_match(team1, team2, match_start_time).await
    }

    async fn confirm(&self, tx: TxHandle, request: &CreateMarketRequest) -> CreationOutcome {
        let receipt = match wait_for_receipt(self.reader.as_ref(), tx, &self.policy).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(%tx, error = %e, "Market creation submitted but not confirmed");
                return CreationOutcome::Unresolved {
                    tx,
                    reason: e.to_string(),
                };
            }
        };
        self.settle(request, receipt).await
    }

    async fn settle(&self, request: &CreateMarketRequest, receipt: TxReceipt) -> CreationOutcome {
        let tx = receipt.tx;
        if !receipt.status.is_success() {
            warn!(%tx, "Market creation reverted");
            return CreationOutcome::Reverted { tx };
        }

        let Some(address) = find_market_created(&receipt.logs) else {
            warn!(%tx, logs = receipt.logs.len(), "No creation event in receipt");
            return CreationOutcome::ConfirmedUnresolved { tx };
        };
        metrics::inc_markets_created();
        info!(%tx, %address, block = ?receipt.block_number, "Market created");

        let record = request.record(address, receipt.block_number);
        let persisted = match self.store.upsert(&record).await {
            Ok(()) => {
                debug!(%address, "Market persisted");
                true
            }
            Err(e) => {
                warn!(%address, error = %e, "Failed to persist market, chain remains authoritative");
                false
            }
        };

        CreationOutcome::Created {
            address,
            block_number: receipt.block_number,
            tx,
            persisted,
        }
    }
}

//! Placing a stake in the current epoch.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::chain::{wait_for_receipt, BetCall, ChainReader, ChainWriter, ConfirmationPolicy, TxHandle};
use crate::error::{ChainError, StakeError};
use crate::market::payout::{estimate_payout, PROTOCOL_FEE_BPS};
use crate::market::{compute_epoch, is_address_shaped, Clock, EventType, Market};
use crate::metrics;

/// Decimals of the native token.
pub const NATIVE_DECIMALS: u32 = 18;

/// A stake to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeRequest {
    /// Event type.
    pub event_type: EventType,
    /// Outcome index, 0 or 1.
    pub outcome: u8,
    /// Amount in whole tokens.
    pub amount: Decimal,
}

/// A confirmed stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeReceipt {
    /// Stake transaction.
    pub tx: TxHandle,
    /// Epoch the stake landed in.
    pub epoch: u8,
    /// Value sent, in wei.
    pub value: U256,
    /// Confirming block.
    pub block_number: Option<u64>,
}

/// Convert a whole-token amount to wei.
pub fn to_wei(amount: Decimal) -> Result<U256, StakeError> {
    if amount <= Decimal::ZERO {
        return Err(StakeError::InvalidAmount(format!("{amount} must be positive")));
    }
    if amount.normalize().scale() > NATIVE_DECIMALS {
        return Err(StakeError::InvalidAmount(format!(
            "{amount} has more than {NATIVE_DECIMALS} decimals"
        )));
    }
    let wei = amount
        .checked_mul(Decimal::from(10u64.pow(NATIVE_DECIMALS)))
        .and_then(|wei| wei.trunc().to_u128())
        .ok_or_else(|| StakeError::InvalidAmount(format!("{amount} is too large")))?;
    Ok(U256::from(wei))
}

/// Places stakes, gated by the epoch clock.
#[derive(Clone)]
pub struct StakeFlow {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    clock: Arc<dyn Clock>,
    policy: ConfirmationPolicy,
}

impl StakeFlow {
    /// Create the flow.
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        clock: Arc<dyn Clock>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            reader,
            writer,
            clock,
            policy,
        }
    }

    /// Place a stake on `market` in the current epoch.
    ///
    /// Rejected unless the epoch clock reads `Open`.
    #[instrument(skip(self, market), fields(market = %market.id))]
    pub async fn place_stake(
        &self,
        wallet: Option<Address>,
        market: &Market,
        request: StakeRequest,
    ) -> Result<StakeReceipt, StakeError> {
        let address = market_address(market)?;
        let wallet = wallet.ok_or(StakeError::WalletNotConnected)?;

        let info = compute_epoch(self.clock.now(), market.match_start_time);
        let epoch = match info.epoch {
            Some(epoch) if info.status.accepts_stakes() => epoch,
            _ => {
                return Err(StakeError::TradingClosed {
                    status: info.status,
                    epoch: info.epoch,
                })
            }
        };
        if request.outcome > 1 {
            return Err(StakeError::InvalidOutcome(request.outcome));
        }
        let value = to_wei(request.amount)?;

        let call = BetCall {
            event_type: request.event_type,
            epoch_index: epoch,
            outcome: request.outcome,
        };
        let tx = self
            .writer
            .submit_place_bet(wallet, address, &call, value)
            .await
            .map_err(StakeError::Submission)?;
        metrics::inc_stakes_submitted();
        info!(%tx, epoch, event = %request.event_type, outcome = request.outcome, "Stake submitted");

        let receipt = wait_for_receipt(self.reader.as_ref(), tx, &self.policy)
            .await
            .map_err(StakeError::Confirmation)?;
        if !receipt.status.is_success() {
            warn!(%tx, "Stake reverted");
            return Err(StakeError::Reverted { tx });
        }

        Ok(StakeReceipt {
            tx,
            epoch,
            value,
            block_number: receipt.block_number,
        })
    }

    /// Estimated payout if `amount` wei joined `outcome` in an epoch pool now.
    pub async fn quote(
        &self,
        market: Address,
        event_type: EventType,
        epoch: u8,
        outcome: u8,
        amount: U256,
    ) -> Result<U256, ChainError> {
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        let pool = self.reader.epoch_pool(market, event_type, epoch).await?;
        let outcome_stake = pool
            .outcome_stakes
            .get(usize::from(outcome))
            .copied()
            .unwrap_or_default()
            + amount;
        let total = pool.total_stake + amount;
        let net_pool = estimate_payout(total, total, PROTOCOL_FEE_BPS);
        Ok(net_pool * amount / outcome_stake)
    }
}

fn market_address(market: &Market) -> Result<Address, StakeError> {
    let no_address = || StakeError::NoMarketAddress {
        id: market.id.clone(),
    };
    if !is_address_shaped(&market.id) {
        return Err(no_address());
    }
    market.id.parse().map_err(|_| no_address())
}

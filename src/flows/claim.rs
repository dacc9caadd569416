//! Claiming winnings on a resolved epoch.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, instrument, warn};

use crate::chain::{
    transfer_token_ids, wait_for_receipt, ChainReader, ChainWriter, ConfirmationPolicy, TxHandle,
};
use crate::error::{ChainError, ClaimError};
use crate::market::is_address_shaped;
use crate::metrics;

/// A confirmed, successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Receipt token claimed against.
    pub token_id: U256,
    /// Claim transaction.
    pub tx: TxHandle,
    /// Confirming block.
    pub block_number: Option<u64>,
}

/// Finds the wallet's receipt token for a market epoch and claims it.
///
/// Each step is a single attempt; callers retry.
#[derive(Clone)]
pub struct ClaimFlow {
    reader: Arc<dyn ChainReader>,
    writer: Arc<dyn ChainWriter>,
    policy: ConfirmationPolicy,
}

impl ClaimFlow {
    /// Create the flow.
    pub fn new(
        reader: Arc<dyn ChainReader>,
        writer: Arc<dyn ChainWriter>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            reader,
            writer,
            policy,
        }
    }

    /// Claim winnings for `epoch` of market `market_id`.
    #[instrument(skip(self), fields(wallet = ?wallet))]
    pub async fn claim(
        &self,
        wallet: Option<Address>,
        market_id: &str,
        epoch: u8,
    ) -> Result<ClaimReceipt, ClaimError> {
        let market = parse_market(market_id)?;
        let wallet = wallet.ok_or(ClaimError::WalletNotConnected)?;

        let token_id = self.find_receipt_token(wallet, market, epoch).await?;
        info!(%market, %token_id, epoch, "Submitting claim");

        let tx = self
            .writer
            .submit_claim(wallet, market, token_id)
            .await
            .map_err(ClaimError::Submission)?;
        metrics::inc_claims_submitted();

        let receipt = wait_for_receipt(self.reader.as_ref(), tx, &self.policy)
            .await
            .map_err(ClaimError::Confirmation)?;
        if !receipt.status.is_success() {
            warn!(%tx, "Claim reverted");
            return Err(ClaimError::Reverted { tx });
        }

        info!(%tx, %token_id, "Claim confirmed");
        Ok(ClaimReceipt {
            token_id,
            tx,
            block_number: receipt.block_number,
        })
    }

    /// Receipt token held by `wallet` for `(market, epoch)`.
    ///
    /// Candidates come from the owner read, or from transfer logs when that
    /// read is unavailable. A candidate is accepted only after its metadata
    /// matches and a fresh ownership read confirms the wallet still holds it.
    /// A failed read on one candidate skips that candidate.
    pub async fn find_receipt_token(
        &self,
        wallet: Address,
        market: Address,
        epoch: u8,
    ) -> Result<U256, ClaimError> {
        let receipts = self
            .reader
            .receipt_token_contract(market)
            .await
            .map_err(ClaimError::ReceiptContract)?;

        let candidates = self.candidate_tokens(receipts, wallet).await?;
        if candidates.is_empty() {
            return Err(ClaimError::NoReceipts);
        }
        debug!(candidates = candidates.len(), "Checking receipt tokens");

        for token_id in candidates {
            let bet = match self.reader.bet_metadata(receipts, token_id).await {
                Ok(bet) => bet,
                Err(e) => {
                    warn!(%token_id, error = %e, "Skipping token with unreadable metadata");
                    continue;
                }
            };
            if bet.market != market || bet.epoch_index != epoch {
                continue;
            }

            match self.reader.owner_of(receipts, token_id).await {
                Ok(owner) if owner == wallet => return Ok(token_id),
                Ok(owner) => debug!(%token_id, %owner, "Token no longer held by wallet"),
                Err(e) => warn!(%token_id, error = %e, "Skipping token with unreadable owner"),
            }
        }

        Err(ClaimError::NoMatchingReceipt { epoch })
    }

    async fn candidate_tokens(
        &self,
        receipts: Address,
        wallet: Address,
    ) -> Result<Vec<U256>, ClaimError> {
        match self.reader.receipts_of_owner(receipts, wallet).await {
            Ok(ids) => return Ok(ids),
            Err(ChainError::Unsupported(call)) => {
                debug!(call, "Owner read unsupported, scanning transfer logs")
            }
            Err(e) => warn!(error = %e, "Owner read failed, scanning transfer logs"),
        }

        let logs = self
            .reader
            .transfer_logs_to(receipts, wallet)
            .await
            .map_err(ClaimError::Enumeration)?;
        Ok(transfer_token_ids(&logs, wallet))
    }
}

fn parse_market(market_id: &str) -> Result<Address, ClaimError> {
    if !is_address_shaped(market_id) {
        return Err(ClaimError::NoMarketAddress {
            id: market_id.to_string(),
        });
    }
    market_id.parse().map_err(|_| ClaimError::NoMarketAddress {
        id: market_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BetMetadata, CreateMarketCall, SimulatedChain};
    use crate::market::EventType;

    const WALLET: Address = Address::repeat_byte(0x77);

    struct Setup {
        chain: Arc<SimulatedChain>,
        flow: ClaimFlow,
        market: Address,
    }

    fn setup() -> Setup {
        let chain = Arc::new(SimulatedChain::new());
        let market = chain.deploy_market(&CreateMarketCall {
            match_details: "Arsenal vs Chelsea".into(),
            match_start_time: 1_760_000_000,
            team_a: "Arsenal".into(),
            team_b: "Chelsea".into(),
        });
        let flow = ClaimFlow::new(chain.clone(), chain.clone(), ConfirmationPolicy::default());
        Setup {
            chain,
            flow,
            market,
        }
    }

    fn bet(market: Address, epoch: u8, outcome: u8) -> BetMetadata {
        BetMetadata {
            market,
            event_type: EventType::Goal,
            epoch_index: epoch,
            outcome,
            stake_amount: U256::from(1_000u64),
        }
    }

    #[tokio::test]
    async fn fails_fast_without_address_or_wallet() {
        let s = setup();
        let err = s.flow.claim(Some(WALLET), "7", 1).await.unwrap_err();
        assert!(matches!(err, ClaimError::NoMarketAddress { .. }));

        let err = s.flow.claim(None, &s.market.to_string(), 1).await.unwrap_err();
        assert!(matches!(err, ClaimError::WalletNotConnected));
    }

    #[tokio::test]
    async fn no_tokens_and_no_match_are_distinct() {
        let s = setup();
        let err = s.flow.find_receipt_token(WALLET, s.market, 2).await.unwrap_err();
        assert!(matches!(err, ClaimError::NoReceipts));

        s.chain.mint_receipt(WALLET, bet(s.market, 1, 0));
        let err = s.flow.find_receipt_token(WALLET, s.market, 2).await.unwrap_err();
        assert!(matches!(err, ClaimError::NoMatchingReceipt { epoch: 2 }));
    }

    #[tokio::test]
    async fn falls_back_to_transfer_logs() {
        let s = setup();
        s.chain.set_supports_receipts_of_owner(false);
        let token = s.chain.mint_receipt(WALLET, bet(s.market, 3, 0));

        assert_eq!(s.flow.find_receipt_token(WALLET, s.market, 3).await.unwrap(), token);
    }

    #[tokio::test]
    async fn transferred_token_is_rejected() {
        let s = setup();
        s.chain.set_supports_receipts_of_owner(false);
        let token = s.chain.mint_receipt(WALLET, bet(s.market, 3, 0));
        s.chain.transfer_receipt(token, Address::repeat_byte(0x99));

        let err = s.flow.find_receipt_token(WALLET, s.market, 3).await.unwrap_err();
        assert!(matches!(err, ClaimError::NoMatchingReceipt { epoch: 3 }));
    }

    #[tokio::test]
    async fn unreadable_metadata_does_not_stop_enumeration() {
        let s = setup();
        let broken = s.chain.mint_receipt(WALLET, bet(s.market, 2, 0));
        let good = s.chain.mint_receipt(WALLET, bet(s.market, 2, 1));
        s.chain.fail_metadata(broken);

        assert_eq!(s.flow.find_receipt_token(WALLET, s.market, 2).await.unwrap(), good);
    }

    #[tokio::test]
    async fn winning_claim_succeeds() {
        let s = setup();
        let token = s.chain.mint_receipt(WALLET, bet(s.market, 1, 1));
        s.chain.resolve_pool(s.market, EventType::Goal, 1, 1);

        let receipt = s.flow.claim(Some(WALLET), &s.market.to_string(), 1).await.unwrap();
        assert_eq!(receipt.token_id, token);
        assert!(s.chain.is_claimed(token));
    }

    #[tokio::test]
    async fn losing_claim_reports_revert() {
        let s = setup();
        s.chain.mint_receipt(WALLET, bet(s.market, 1, 0));
        s.chain.resolve_pool(s.market, EventType::Goal, 1, 1);

        let err = s.flow.claim(Some(WALLET), &s.market.to_string(), 1).await.unwrap_err();
        assert!(matches!(err, ClaimError::Reverted { .. }));
    }
}

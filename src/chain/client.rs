//! Contract call layer seams.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use super::types::{BetCall, BetMetadata, CreateMarketCall, LogEntry, PoolDetails, TxHandle, TxReceipt};
use crate::error::ChainError;
use crate::market::EventType;

/// Read side of the contract layer.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Pool details for one event type in one epoch.
    async fn epoch_pool(
        &self,
        market: Address,
        event_type: EventType,
        epoch: u8,
    ) -> Result<PoolDetails, ChainError>;

    /// Receipt-token contract associated with a market.
    async fn receipt_token_contract(&self, market: Address) -> Result<Address, ChainError>;

    /// Token ids held by `owner`. May return [`ChainError::Unsupported`].
    async fn receipts_of_owner(
        &self,
        receipt_contract: Address,
        owner: Address,
    ) -> Result<Vec<U256>, ChainError>;

    /// Transfer logs of the receipt contract whose recipient is `recipient`.
    async fn transfer_logs_to(
        &self,
        receipt_contract: Address,
        recipient: Address,
    ) -> Result<Vec<LogEntry>, ChainError>;

    /// Bet recorded against a token.
    async fn bet_metadata(
        &self,
        receipt_contract: Address,
        token_id: U256,
    ) -> Result<BetMetadata, ChainError>;

    /// Current owner of a token.
    async fn owner_of(&self, receipt_contract: Address, token_id: U256)
        -> Result<Address, ChainError>;

    /// Receipt of a transaction, `None` while pending.
    async fn transaction_receipt(&self, tx: TxHandle) -> Result<Option<TxReceipt>, ChainError>;
}

/// Write side of the contract layer.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Submit a market-creation transaction to the factory.
    async fn submit_create_market(
        &self,
        from: Address,
        call: &CreateMarketCall,
    ) -> Result<TxHandle, ChainError>;

    /// Submit a stake-placing transaction carrying `value` wei.
    async fn submit_place_bet(
        &self,
        from: Address,
        market: Address,
        call: &BetCall,
        value: U256,
    ) -> Result<TxHandle, ChainError>;

    /// Submit a claim for a receipt token.
    async fn submit_claim(
        &self,
        from: Address,
        market: Address,
        token_id: U256,
    ) -> Result<TxHandle, ChainError>;
}

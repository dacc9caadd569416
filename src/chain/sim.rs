//! In-memory contract simulator.
//!
//! Stands in for the factory, market and receipt-token contracts so the
//! reconciler and flows can run without an RPC endpoint. Failure modes are
//! switchable at runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use super::client::{ChainReader, ChainWriter};
use super::events::{market_created_log, transfer_log};
use super::types::{
    BetCall, BetMetadata, CreateMarketCall, LogEntry, PoolDetails, ReceiptStatus, TxHandle,
    TxReceipt,
};
use crate::error::ChainError;
use crate::market::{EventType, EPOCH_COUNT};

/// Default factory address.
pub const SIM_FACTORY_ADDRESS: Address = Address::repeat_byte(0xfa);

/// Default receipt-token contract address.
pub const SIM_RECEIPT_CONTRACT: Address = Address::repeat_byte(0xbe);

/// A deployed market.
#[derive(Debug, Clone)]
pub struct SimMarket {
    /// Match description.
    pub match_details: String,
    /// Kick-off, unix seconds.
    pub match_start_time: i64,
    /// Home team.
    pub team_a: String,
    /// Away team.
    pub team_b: String,
    /// Pools by (event type, epoch).
    pub pools: HashMap<(EventType, u8), PoolDetails>,
}

#[derive(Debug, Clone)]
struct SimToken {
    bet: BetMetadata,
    owner: Address,
    claimed: bool,
}

/// In-memory contract simulator.
#[derive(Debug)]
pub struct SimulatedChain {
    factory: Address,
    receipt_contract: Address,
    markets: DashMap<Address, SimMarket>,
    tokens: DashMap<U256, SimToken>,
    transfers: DashMap<u64, LogEntry>,
    receipts: DashMap<B256, TxReceipt>,
    failing_pools: DashSet<Address>,
    failing_metadata: DashSet<U256>,
    block: AtomicU64,
    nonce: AtomicU64,
    next_token: AtomicU64,
    transfer_seq: AtomicU64,
    supports_receipts_of_owner: AtomicBool,
    emit_market_created: AtomicBool,
    unrelated_logs: AtomicU64,
    withhold_receipts: AtomicBool,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChain {
    /// Create a simulator with default contract addresses.
    pub fn new() -> Self {
        Self::with_factory(SIM_FACTORY_ADDRESS)
    }

    /// Create a simulator with a given factory address.
    pub fn with_factory(factory: Address) -> Self {
        Self {
            factory,
            receipt_contract: SIM_RECEIPT_CONTRACT,
            markets: DashMap::new(),
            tokens: DashMap::new(),
            transfers: DashMap::new(),
            receipts: DashMap::new(),
            failing_pools: DashSet::new(),
            failing_metadata: DashSet::new(),
            block: AtomicU64::new(1_000),
            nonce: AtomicU64::new(0),
            next_token: AtomicU64::new(1),
            transfer_seq: AtomicU64::new(0),
            supports_receipts_of_owner: AtomicBool::new(true),
            emit_market_created: AtomicBool::new(true),
            unrelated_logs: AtomicU64::new(0),
            withhold_receipts: AtomicBool::new(false),
        }
    }

    /// Factory address.
    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Receipt-token contract address.
    pub fn receipt_contract(&self) -> Address {
        self.receipt_contract
    }

    /// Deploy a market directly, without a transaction.
    pub fn deploy_market(&self, call: &CreateMarketCall) -> Address {
        let address = Address::from_word(self.next_hash());
        self.markets.insert(
            address,
            SimMarket {
                match_details: call.match_details.clone(),
                match_start_time: call.match_start_time,
                team_a: call.team_a.clone(),
                team_b: call.team_b.clone(),
                pools: HashMap::new(),
            },
        );
        address
    }

    /// Deployed market, if any.
    pub fn market(&self, address: Address) -> Option<SimMarket> {
        self.markets.get(&address).map(|m| m.clone())
    }

    /// Number of deployed markets.
    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    /// Resolve one pool.
    pub fn resolve_pool(&self, market: Address, event_type: EventType, epoch: u8, winning_outcome: u8) {
        if let Some(mut m) = self.markets.get_mut(&market) {
            let pool = m.pools.entry((event_type, epoch)).or_default();
            pool.resolved = true;
            pool.winning_outcome = winning_outcome;
        }
    }

    /// Mint a receipt token to `owner`.
    pub fn mint_receipt(&self, owner: Address, bet: BetMetadata) -> U256 {
        let token_id = U256::from(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.tokens.insert(
            token_id,
            SimToken {
                bet,
                owner,
                claimed: false,
            },
        );
        self.record_transfer(Address::ZERO, owner, token_id);
        token_id
    }

    /// Move a receipt token to a new owner.
    pub fn transfer_receipt(&self, token_id: U256, to: Address) {
        let from = match self.tokens.get_mut(&token_id) {
            Some(mut token) => std::mem::replace(&mut token.owner, to),
            None => return,
        };
        self.record_transfer(from, to, token_id);
    }

    /// Whether a token has been claimed.
    pub fn is_claimed(&self, token_id: U256) -> bool {
        self.tokens.get(&token_id).is_some_and(|t| t.claimed)
    }

    /// Make pool reads for `market` fail.
    pub fn fail_pool_reads(&self, market: Address) {
        self.failing_pools.insert(market);
    }

    /// Make metadata reads for `token_id` fail.
    pub fn fail_metadata(&self, token_id: U256) {
        self.failing_metadata.insert(token_id);
    }

    /// Toggle support for the direct receipts-by-owner read.
    pub fn set_supports_receipts_of_owner(&self, supported: bool) {
        self.supports_receipts_of_owner.store(supported, Ordering::SeqCst);
    }

    /// Toggle emission of the creation event.
    pub fn set_emit_market_created(&self, emit: bool) {
        self.emit_market_created.store(emit, Ordering::SeqCst);
    }

    /// Number of unrelated logs placed before the creation event.
    pub fn set_unrelated_logs(&self, count: u64) {
        self.unrelated_logs.store(count, Ordering::SeqCst);
    }

    /// Never report receipts for new transactions.
    pub fn set_withhold_receipts(&self, withhold: bool) {
        self.withhold_receipts.store(withhold, Ordering::SeqCst);
    }

    fn next_hash(&self) -> B256 {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        keccak256(nonce.to_be_bytes())
    }

    fn record_transfer(&self, from: Address, to: Address, token_id: U256) {
        let seq = self.transfer_seq.fetch_add(1, Ordering::SeqCst);
        self.transfers
            .insert(seq, transfer_log(self.receipt_contract, from, to, token_id));
    }

    fn unrelated_log(&self, index: u64) -> LogEntry {
        LogEntry {
            address: Address::repeat_byte(0x01),
            topics: vec![
                keccak256(format!("Unrelated{index}(uint256)")),
                B256::repeat_byte(index as u8),
            ],
            data: Bytes::new(),
        }
    }

    fn commit(&self, status: ReceiptStatus, logs: Vec<LogEntry>) -> TxHandle {
        let tx = TxHandle(self.next_hash());
        let block_number = self.block.fetch_add(1, Ordering::SeqCst);
        if !self.withhold_receipts.load(Ordering::SeqCst) {
            self.receipts.insert(
                tx.hash(),
                TxReceipt {
                    tx,
                    block_number: Some(block_number),
                    status,
                    logs,
                },
            );
        }
        tx
    }

    fn read_error(call: &'static str, reason: impl Into<String>) -> ChainError {
        ChainError::Read {
            call,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChainReader for SimulatedChain {
    async fn epoch_pool(
        &self,
        market: Address,
        event_type: EventType,
        epoch: u8,
    ) -> Result<PoolDetails, ChainError> {
        if self.failing_pools.contains(&market) {
            return Err(Self::read_error("getEpochPoolDetails", "simulated failure"));
        }
        if epoch == 0 || epoch > EPOCH_COUNT {
            return Err(Self::read_error("getEpochPoolDetails", "epoch out of range"));
        }
        let m = self
            .markets
            .get(&market)
            .ok_or_else(|| Self::read_error("getEpochPoolDetails", "unknown market"))?;
        Ok(m.pools.get(&(event_type, epoch)).copied().unwrap_or_default())
    }

    async fn receipt_token_contract(&self, market: Address) -> Result<Address, ChainError> {
        if !self.markets.contains_key(&market) {
            return Err(Self::read_error("betReceiptNFT", "unknown market"));
        }
        Ok(self.receipt_contract)
    }

    async fn receipts_of_owner(
        &self,
        receipt_contract: Address,
        owner: Address,
    ) -> Result<Vec<U256>, ChainError> {
        if !self.supports_receipts_of_owner.load(Ordering::SeqCst) {
            return Err(ChainError::Unsupported("getReceiptsByOwner"));
        }
        if receipt_contract != self.receipt_contract {
            return Err(Self::read_error("getReceiptsByOwner", "unknown contract"));
        }
        let mut ids: Vec<U256> = self
            .tokens
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn transfer_logs_to(
        &self,
        receipt_contract: Address,
        recipient: Address,
    ) -> Result<Vec<LogEntry>, ChainError> {
        let recipient_topic = recipient.into_word();
        let mut logs: Vec<(u64, LogEntry)> = self
            .transfers
            .iter()
            .filter(|entry| {
                entry.address == receipt_contract && entry.topics.get(2) == Some(&recipient_topic)
            })
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        logs.sort_by_key(|(seq, _)| *seq);
        Ok(logs.into_iter().map(|(_, log)| log).collect())
    }

    async fn bet_metadata(
        &self,
        receipt_contract: Address,
        token_id: U256,
    ) -> Result<BetMetadata, ChainError> {
        if receipt_contract != self.receipt_contract || self.failing_metadata.contains(&token_id) {
            return Err(Self::read_error("getBetMetadata", "simulated failure"));
        }
        self.tokens
            .get(&token_id)
            .map(|t| t.bet.clone())
            .ok_or_else(|| Self::read_error("getBetMetadata", "unknown token"))
    }

    async fn owner_of(
        &self,
        receipt_contract: Address,
        token_id: U256,
    ) -> Result<Address, ChainError> {
        if receipt_contract != self.receipt_contract {
            return Err(Self::read_error("ownerOf", "unknown contract"));
        }
        self.tokens
            .get(&token_id)
            .map(|t| t.owner)
            .ok_or_else(|| Self::read_error("ownerOf", "unknown token"))
    }

    async fn transaction_receipt(&self, tx: TxHandle) -> Result<Option<TxReceipt>, ChainError> {
        Ok(self.receipts.get(&tx.hash()).map(|r| r.clone()))
    }
}

#[async_trait]
impl ChainWriter for SimulatedChain {
    async fn submit_create_market(
        &self,
        from: Address,
        call: &CreateMarketCall,
    ) -> Result<TxHandle, ChainError> {
        if call.team_a.is_empty() || call.team_b.is_empty() {
            return Err(ChainError::Submission("team names required".to_string()));
        }
        let market = self.deploy_market(call);
        debug!(%from, %market, "Simulated market deployment");

        let mut logs: Vec<LogEntry> = (0..self.unrelated_logs.load(Ordering::SeqCst))
            .map(|i| self.unrelated_log(i))
            .collect();
        if self.emit_market_created.load(Ordering::SeqCst) {
            logs.push(market_created_log(self.factory, market));
        }
        Ok(self.commit(ReceiptStatus::Success, logs))
    }

    async fn submit_place_bet(
        &self,
        from: Address,
        market: Address,
        call: &BetCall,
        value: U256,
    ) -> Result<TxHandle, ChainError> {
        {
            let mut m = self
                .markets
                .get_mut(&market)
                .ok_or_else(|| ChainError::Submission("unknown market".to_string()))?;
            let pool = m.pools.entry((call.event_type, call.epoch_index)).or_default();
            if pool.resolved {
                drop(m);
                return Ok(self.commit(ReceiptStatus::Reverted, Vec::new()));
            }
            pool.total_stake += value;
            pool.outcome_stakes[usize::from(call.outcome.min(1))] += value;
        }

        let token_id = self.mint_receipt(
            from,
            BetMetadata {
                market,
                event_type: call.event_type,
                epoch_index: call.epoch_index,
                outcome: call.outcome,
                stake_amount: value,
            },
        );
        let mint = transfer_log(self.receipt_contract, Address::ZERO, from, token_id);
        Ok(self.commit(ReceiptStatus::Success, vec![mint]))
    }

    async fn submit_claim(
        &self,
        from: Address,
        market: Address,
        token_id: U256,
    ) -> Result<TxHandle, ChainError> {
        let winning = {
            let token = self
                .tokens
                .get(&token_id)
                .ok_or_else(|| ChainError::Submission("unknown token".to_string()))?;
            let pool = self
                .markets
                .get(&market)
                .and_then(|m| m.pools.get(&(token.bet.event_type, token.bet.epoch_index)).copied());
            token.owner == from
                && token.bet.market == market
                && !token.claimed
                && pool.is_some_and(|p| p.resolved && p.winning_outcome == token.bet.outcome)
        };

        if !winning {
            return Ok(self.commit(ReceiptStatus::Reverted, Vec::new()));
        }
        if let Some(mut token) = self.tokens.get_mut(&token_id) {
            token.claimed = true;
        }
        Ok(self.commit(ReceiptStatus::Success, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::events::find_market_created;

    fn call() -> CreateMarketCall {
        CreateMarketCall {
            match_details: "Arsenal vs Chelsea".into(),
            match_start_time: 1_760_000_000,
            team_a: "Arsenal".into(),
            team_b: "Chelsea".into(),
        }
    }

    #[tokio::test]
    async fn creation_receipt_announces_market() {
        let chain = SimulatedChain::new();
        chain.set_unrelated_logs(2);
        let tx = chain
            .submit_create_market(Address::repeat_byte(7), &call())
            .await
            .unwrap();

        let receipt = chain.transaction_receipt(tx).await.unwrap().unwrap();
        assert_eq!(receipt.logs.len(), 3);
        let market = find_market_created(&receipt.logs).unwrap();
        assert_eq!(chain.market(market).unwrap().team_a, "Arsenal");
    }

    #[tokio::test]
    async fn bets_mint_receipts_and_move_pools() {
        let chain = SimulatedChain::new();
        let market = chain.deploy_market(&call());
        let bettor = Address::repeat_byte(5);
        let bet = BetCall {
            event_type: EventType::Goal,
            epoch_index: 2,
            outcome: 1,
        };

        chain
            .submit_place_bet(bettor, market, &bet, U256::from(10u64))
            .await
            .unwrap();

        let pool = chain.epoch_pool(market, EventType::Goal, 2).await.unwrap();
        assert_eq!(pool.total_stake, U256::from(10u64));
        assert_eq!(pool.outcome_stakes[1], U256::from(10u64));

        let owned = chain
            .receipts_of_owner(chain.receipt_contract(), bettor)
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
    }

    #[tokio::test]
    async fn unsupported_owner_read_reports_unsupported() {
        let chain = SimulatedChain::new();
        chain.set_supports_receipts_of_owner(false);
        let err = chain
            .receipts_of_owner(chain.receipt_contract(), Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Unsupported(_)));
    }
}

//! Shared fixtures.

use std::sync::Arc;

use alloy::primitives::Address;
use epochal_markets::backend::{InMemoryMarketStore, MarketRecord};
use epochal_markets::chain::{CreateMarketCall, SimulatedChain};
use epochal_markets::market::ManualClock;
use epochal_markets::reconciler::{MarketReconciler, ReconcilerConfig};

pub const NOW: i64 = 1_760_000_000;
pub const WALLET: Address = Address::repeat_byte(0x77);

pub struct World {
    pub store: Arc<InMemoryMarketStore>,
    pub chain: Arc<SimulatedChain>,
    pub clock: Arc<ManualClock>,
    pub reconciler: MarketReconciler,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let store = Arc::new(InMemoryMarketStore::new());
        let chain = Arc::new(SimulatedChain::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let reconciler =
            MarketReconciler::new(config, store.clone(), chain.clone(), clock.clone());
        Self {
            store,
            chain,
            clock,
            reconciler,
        }
    }

    /// Deploy a market on the simulated chain.
    pub fn deploy(&self, team1: &str, team2: &str, start: i64) -> Address {
        self.chain.deploy_market(&CreateMarketCall {
            match_details: format!("{team1} vs {team2}"),
            match_start_time: start,
            team_a: team1.to_string(),
            team_b: team2.to_string(),
        })
    }
}

/// Backend row for a deployed market.
pub fn record(address: Address, team1: &str, team2: &str, start: i64) -> MarketRecord {
    let mut record = MarketRecord::new(address.to_string(), team1, team2);
    record.address = Some(address.to_string());
    record.match_start_time = Some(start);
    record
}

//! Market reconciler.
//!
//! Owns the single market table and keeps it consistent across three
//! independent inputs:
//! - the seed fixtures, applied once at start
//! - the backend feed, polled on a fixed interval
//! - per-market on-chain resolution checks, run as tracked background tasks
//!   when a contract layer is attached
//!
//! The table is published through a `watch` channel as an immutable snapshot.
//! Every change builds a new table and swaps it in, so readers never observe
//! a partial update. After [`MarketReconciler::shutdown`] no late result is
//! applied.

pub mod merge;
pub mod resolution;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::backend::MarketStore;
use crate::chain::ChainReader;
use crate::config::Config;
use crate::error::BackendError;
use crate::market::{is_address_shaped, Category, Clock, Market, EPOCH_COUNT};
use crate::metrics;

pub use merge::MarketTable;
pub use resolution::lookup_resolution;

/// Runtime knobs of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Backend feed poll period.
    pub poll_interval: Duration,
    /// Category refresh period.
    pub recategorize_interval: Duration,
    /// Cap on in-flight per-market resolution checks.
    pub max_concurrent_checks: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            recategorize_interval: Duration::from_secs(15),
            max_concurrent_checks: 8,
        }
    }
}

impl ReconcilerConfig {
    /// Derive from application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            recategorize_interval: Duration::from_secs(config.recategorize_interval_secs),
            max_concurrent_checks: config.max_concurrent_resolution_checks.max(1),
        }
    }
}

/// Counters exposed by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerStats {
    /// Markets in the table.
    pub markets: usize,
    /// Successful backend polls.
    pub polls: u64,
    /// Failed backend polls.
    pub poll_failures: u64,
    /// Completed resolution checks.
    pub resolution_checks: u64,
    /// Markets newly marked resolved from chain data.
    pub markets_resolved: u64,
    /// Category refreshes that changed something.
    pub recategorizations: u64,
    /// Unix seconds of the last successful poll.
    pub last_poll_at: Option<i64>,
}

struct Inner {
    config: ReconcilerConfig,
    store: Arc<dyn MarketStore>,
    chain: Option<Arc<dyn ChainReader>>,
    clock: Arc<dyn Clock>,
    table: watch::Sender<Arc<MarketTable>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    checks: Arc<Semaphore>,
    in_flight: DashSet<String>,
    polls: AtomicU64,
    poll_failures: AtomicU64,
    resolution_checks: AtomicU64,
    markets_resolved: AtomicU64,
    recategorizations: AtomicU64,
    last_poll_at: AtomicI64,
}

/// Handle to the reconciler. Cheap to clone.
#[derive(Clone)]
pub struct MarketReconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MarketReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketReconciler")
            .field("config", &self.inner.config)
            .field("chain", &self.has_chain())
            .field("markets", &self.inner.table.borrow().len())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

impl MarketReconciler {
    /// Create a reconciler with an empty table. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<dyn MarketStore>,
        chain: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(config, store, Some(chain), clock)
    }

    /// Create a reconciler without a contract layer. The feed is still
    /// polled; markets only resolve through an explicit status.
    pub fn without_chain(
        config: ReconcilerConfig,
        store: Arc<dyn MarketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(config, store, None, clock)
    }

    fn build(
        config: ReconcilerConfig,
        store: Arc<dyn MarketStore>,
        chain: Option<Arc<dyn ChainReader>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (table, _) = watch::channel(Arc::new(MarketTable::new()));
        let checks = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                chain,
                clock,
                table,
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
                checks,
                in_flight: DashSet::new(),
                polls: AtomicU64::new(0),
                poll_failures: AtomicU64::new(0),
                resolution_checks: AtomicU64::new(0),
                markets_resolved: AtomicU64::new(0),
                recategorizations: AtomicU64::new(0),
                last_poll_at: AtomicI64::new(0),
            }),
        }
    }

    /// Whether on-chain resolution checks are possible.
    pub fn has_chain(&self) -> bool {
        self.inner.chain.is_some()
    }

    fn now(&self) -> i64 {
        self.inner.clock.now()
    }

    /// Apply `change` to a copy of the table and publish it if it reports a
    /// change. Discarded once shut down.
    fn publish<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut MarketTable) -> bool,
    {
        if self.inner.cancel.is_cancelled() {
            debug!("Reconciler shut down, discarding update");
            return false;
        }
        let changed = self.inner.table.send_if_modified(|current| {
            let mut next = (**current).clone();
            if change(&mut next) {
                *current = Arc::new(next);
                true
            } else {
                false
            }
        });
        if changed {
            metrics::set_markets_tracked(self.inner.table.borrow().len());
        }
        changed
    }

    /// Load seed markets, skipping schedule-less upcoming placeholders.
    pub fn seed(&self, markets: Vec<Market>) -> bool {
        let now = self.now();
        self.publish(|table| merge::apply_seed(table, markets, now))
    }

    /// Poll the backend feed once and upsert its rows.
    ///
    /// Each fetched address-shaped market gets a background resolution check.
    /// Returns the number of markets inserted or changed.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<usize, BackendError> {
        let timer = metrics::timer_poll();
        let rows = match self.inner.store.recent().await {
            Ok(rows) => rows,
            Err(e) => {
                self.inner.poll_failures.fetch_add(1, Ordering::Relaxed);
                metrics::inc_poll_failures();
                return Err(e);
            }
        };
        drop(timer);
        if self.inner.cancel.is_cancelled() {
            debug!("Reconciler shut down, discarding poll");
            return Ok(0);
        }

        let now = self.now();
        let mut touched = Vec::new();
        self.publish(|table| {
            touched = merge::apply_feed(table, &rows, now);
            !touched.is_empty()
        });

        self.inner.polls.fetch_add(1, Ordering::Relaxed);
        self.inner.last_poll_at.store(now, Ordering::Relaxed);
        debug!(rows = rows.len(), changed = touched.len(), "Backend poll applied");

        for row in &rows {
            self.spawn_resolution_check(row.market_key());
        }

        Ok(touched.len())
    }

    /// Schedule a background resolution check for market `id`.
    ///
    /// Skipped when no contract layer is attached, `id` is not an address,
    /// the market is unknown or fully resolved, a check is already in flight,
    /// or the reconciler is shut down. Returns whether a check was scheduled.
    pub fn spawn_resolution_check(&self, id: &str) -> bool {
        if !self.has_chain() || self.inner.cancel.is_cancelled() || !is_address_shaped(id) {
            return false;
        }
        let fully_resolved = self
            .get(id)
            .map(|m| (1..=EPOCH_COUNT).all(|epoch| m.has_complete_result_for(epoch)));
        if fully_resolved != Some(false) {
            return false;
        }
        if !self.inner.in_flight.insert(id.to_string()) {
            return false;
        }

        let this = self.clone();
        let id = id.to_string();
        self.inner.tasks.spawn(async move {
            let cancel = this.inner.cancel.clone();
            let checks = Arc::clone(&this.inner.checks);
            tokio::select! {
                _ = cancel.cancelled() => {}
                permit = checks.acquire_owned() => {
                    if let Ok(_permit) = permit {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = this.check_resolution(&id) => {}
                        }
                    }
                }
            }
            this.inner.in_flight.remove(&id);
        });
        true
    }

    /// Read on-chain resolution for market `id` and merge it.
    ///
    /// Returns whether the table changed.
    pub async fn check_resolution(&self, id: &str) -> bool {
        let Some(chain) = self.inner.chain.clone() else {
            return false;
        };
        let Some(market) = self.get(id) else {
            return false;
        };
        let address: Address = match id.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!(id, error = %e, "Market id is not an address");
                return false;
            }
        };

        let results = lookup_resolution(
            chain.as_ref(),
            address,
            &market.team1,
            &market.team2,
        )
        .await;
        self.inner.resolution_checks.fetch_add(1, Ordering::Relaxed);

        let was_resolved = market.status == Some(Category::Resolved);
        let now = self.now();
        let changed = self.publish(|table| merge::merge_resolution(table, id, results, now));
        if changed && !was_resolved {
            self.inner.markets_resolved.fetch_add(1, Ordering::Relaxed);
            metrics::inc_markets_resolved();
            info!(id, "Market resolved on-chain");
        }
        changed
    }

    /// Recompute cached categories. Publishes only when one changed.
    pub fn recategorize(&self) -> bool {
        let now = self.now();
        let changed = self.publish(|table| merge::recategorize(table, now));
        if changed {
            self.inner.recategorizations.fetch_add(1, Ordering::Relaxed);
            metrics::inc_recategorizations();
        }
        changed
    }

    /// Current snapshot of the table.
    pub fn snapshot(&self) -> Arc<MarketTable> {
        Arc::clone(&self.inner.table.borrow())
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketTable>> {
        self.inner.table.subscribe()
    }

    /// One market by id.
    pub fn get(&self, id: &str) -> Option<Market> {
        self.inner.table.borrow().iter().find(|m| m.id == id).cloned()
    }

    /// Markets shown under `category` now, sorted by start time.
    pub fn view(&self, category: Category) -> Vec<Market> {
        merge::select(&self.snapshot(), category, self.now())
    }

    /// All markets sorted by start time.
    pub fn all(&self) -> Vec<Market> {
        merge::sorted(&self.snapshot())
    }

    /// Counters for the status endpoint.
    pub fn stats(&self) -> ReconcilerStats {
        let last = self.inner.last_poll_at.load(Ordering::Relaxed);
        ReconcilerStats {
            markets: self.inner.table.borrow().len(),
            polls: self.inner.polls.load(Ordering::Relaxed),
            poll_failures: self.inner.poll_failures.load(Ordering::Relaxed),
            resolution_checks: self.inner.resolution_checks.load(Ordering::Relaxed),
            markets_resolved: self.inner.markets_resolved.load(Ordering::Relaxed),
            recategorizations: self.inner.recategorizations.load(Ordering::Relaxed),
            last_poll_at: (last > 0).then_some(last),
        }
    }

    /// Start the poll and recategorization timers.
    pub fn start(&self) {
        let this = self.clone();
        self.inner.tasks.spawn(async move { this.poll_loop().await });
        let this = self.clone();
        self.inner.tasks.spawn(async move { this.recategorize_loop().await });
        info!(
            poll_secs = self.inner.config.poll_interval.as_secs(),
            recategorize_secs = self.inner.config.recategorize_interval.as_secs(),
            "Reconciler started"
        );
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.inner.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "Backend poll failed, retrying next tick");
                    }
                }
            }
        }
        debug!("Poll loop stopped");
    }

    async fn recategorize_loop(&self) {
        let mut ticker = tokio::time::interval(self.inner.config.recategorize_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.recategorize();
                }
            }
        }
        debug!("Recategorize loop stopped");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of resolution checks in flight.
    pub fn checks_in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Stop all timers and background checks and wait for them to finish.
    /// Results arriving afterwards are discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("Reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryMarketStore, MarketRecord};
    use crate::chain::{CreateMarketCall, SimulatedChain};
    use crate::market::{EventType, ManualClock, PENDING_RESULT};

    const NOW: i64 = 1_760_000_000;

    struct Harness {
        reconciler: MarketReconciler,
        store: Arc<InMemoryMarketStore>,
        chain: Arc<SimulatedChain>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryMarketStore::new());
        let chain = Arc::new(SimulatedChain::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let reconciler = MarketReconciler::new(
            ReconcilerConfig::default(),
            store.clone(),
            chain.clone(),
            clock.clone(),
        );
        Harness {
            reconciler,
            store,
            chain,
            clock,
        }
    }

    fn deploy(chain: &SimulatedChain, start: i64) -> Address {
        chain.deploy_market(&CreateMarketCall {
            match_details: "Arsenal vs Chelsea".into(),
            match_start_time: start,
            team_a: "Arsenal".into(),
            team_b: "Chelsea".into(),
        })
    }

    fn record_for(address: Address, start: i64) -> MarketRecord {
        let mut record = MarketRecord::new(address.to_string(), "Arsenal", "Chelsea");
        record.address = Some(address.to_string());
        record.match_start_time = Some(start);
        record
    }

    #[tokio::test]
    async fn poll_upserts_rows() {
        let h = harness();
        let address = deploy(&h.chain, NOW + 3600);
        h.store.upsert(&record_for(address, NOW + 3600)).await.unwrap();

        assert_eq!(h.reconciler.poll_once().await.unwrap(), 1);
        assert_eq!(h.reconciler.view(Category::Upcoming).len(), 1);
        assert_eq!(h.reconciler.stats().polls, 1);
        h.reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn check_resolution_marks_market_resolved() {
        let h = harness();
        let address = deploy(&h.chain, NOW - 7200);
        let id = address.to_string();
        h.reconciler
            .seed(vec![Market::new(id.clone(), "Arsenal", "Chelsea").with_start_time(NOW - 7200)]);

        assert!(!h.reconciler.check_resolution(&id).await);
        assert_eq!(h.reconciler.view(Category::Live).len(), 1);

        for event in EventType::ALL {
            h.chain.resolve_pool(address, event, 1, 0);
        }
        assert!(h.reconciler.check_resolution(&id).await);

        let market = h.reconciler.get(&id).unwrap();
        assert_eq!(market.status, Some(Category::Resolved));
        assert_eq!(market.epoch_results.unwrap()[0].goal_team, "Arsenal");
        assert_eq!(h.reconciler.view(Category::Resolved).len(), 1);
        assert_eq!(h.reconciler.stats().markets_resolved, 1);
    }

    #[tokio::test]
    async fn failed_poll_is_counted() {
        struct Down;

        #[async_trait::async_trait]
        impl MarketStore for Down {
            async fn upsert(&self, _: &MarketRecord) -> Result<(), BackendError> {
                Ok(())
            }
            async fn get(&self, _: &str) -> Result<Option<MarketRecord>, BackendError> {
                Ok(None)
            }
            async fn find_by_match(
                &self,
                _: &str,
                _: &str,
                _: i64,
            ) -> Result<Option<MarketRecord>, BackendError> {
                Ok(None)
            }
            async fn recent(&self) -> Result<Vec<MarketRecord>, BackendError> {
                Err(BackendError::Status {
                    status: 503,
                    message: "down".into(),
                })
            }
        }

        let reconciler = MarketReconciler::new(
            ReconcilerConfig::default(),
            Arc::new(Down),
            Arc::new(SimulatedChain::new()),
            Arc::new(ManualClock::new(NOW)),
        );
        reconciler.seed(vec![Market::new("m", "A", "B").with_start_time(NOW)]);

        assert!(reconciler.poll_once().await.is_err());
        assert_eq!(reconciler.stats().poll_failures, 1);
        assert_eq!(reconciler.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn recategorize_publishes_only_on_change() {
        let h = harness();
        h.reconciler
            .seed(vec![Market::new("m", "A", "B").with_start_time(NOW + 1000)]);
        let mut rx = h.reconciler.subscribe();
        rx.mark_unchanged();

        assert!(!h.reconciler.recategorize());
        assert!(!rx.has_changed().unwrap());

        h.clock.advance(1000);
        assert!(h.reconciler.recategorize());
        assert!(rx.has_changed().unwrap());
        assert_eq!(h.reconciler.view(Category::Live).len(), 1);
    }

    #[tokio::test]
    async fn updates_after_shutdown_are_discarded() {
        let h = harness();
        h.reconciler.shutdown().await;

        assert!(!h.reconciler.seed(vec![Market::new("m", "A", "B").with_start_time(NOW)]));
        assert!(h.reconciler.snapshot().is_empty());
        assert!(!h.reconciler.spawn_resolution_check(&Address::repeat_byte(1).to_string()));
    }

    #[tokio::test]
    async fn without_chain_polls_but_never_checks() {
        let store = Arc::new(InMemoryMarketStore::new());
        let reconciler = MarketReconciler::without_chain(
            ReconcilerConfig::default(),
            store.clone(),
            Arc::new(ManualClock::new(NOW)),
        );
        let address = Address::repeat_byte(0x42);
        store.upsert(&record_for(address, NOW - 7200)).await.unwrap();

        assert_eq!(reconciler.poll_once().await.unwrap(), 1);
        assert!(!reconciler.has_chain());
        assert_eq!(reconciler.checks_in_flight(), 0);
        assert!(!reconciler.spawn_resolution_check(&address.to_string()));
        assert!(!reconciler.check_resolution(&address.to_string()).await);
        assert_eq!(reconciler.stats().resolution_checks, 0);
    }

    #[tokio::test]
    async fn poll_after_shutdown_is_not_counted() {
        let h = harness();
        h.store
            .upsert(&record_for(Address::repeat_byte(0x42), NOW + 3600))
            .await
            .unwrap();
        h.reconciler.shutdown().await;

        assert_eq!(h.reconciler.poll_once().await.unwrap(), 0);
        let stats = h.reconciler.stats();
        assert_eq!(stats.polls, 0);
        assert_eq!(stats.last_poll_at, None);
        assert!(h.reconciler.snapshot().is_empty());
    }

    #[tokio::test]
    async fn goal_only_epochs_resolve_and_fill_later() {
        let h = harness();
        let address = deploy(&h.chain, NOW - 7200);
        let id = address.to_string();
        h.reconciler
            .seed(vec![Market::new(id.clone(), "Arsenal", "Chelsea").with_start_time(NOW - 7200)]);

        for epoch in 1..=EPOCH_COUNT {
            h.chain.resolve_pool(address, EventType::Goal, epoch, 1);
        }
        assert!(h.reconciler.check_resolution(&id).await);

        let market = h.reconciler.get(&id).unwrap();
        assert_eq!(market.status, Some(Category::Resolved));
        let results = market.epoch_results.unwrap();
        assert_eq!(results.len(), usize::from(EPOCH_COUNT));
        assert!(results.iter().all(|r| r.goal_team == "Chelsea" && r.cards == PENDING_RESULT));

        // Pending cards keep the market eligible for another check.
        assert!(h.reconciler.spawn_resolution_check(&id));
        h.reconciler.shutdown().await;
    }

    #[tokio::test]
    async fn later_check_fills_pending_side() {
        let h = harness();
        let address = deploy(&h.chain, NOW - 7200);
        let id = address.to_string();
        h.reconciler
            .seed(vec![Market::new(id.clone(), "Arsenal", "Chelsea").with_start_time(NOW - 7200)]);

        h.chain.resolve_pool(address, EventType::Goal, 2, 0);
        assert!(h.reconciler.check_resolution(&id).await);
        h.chain.resolve_pool(address, EventType::Cards, 2, 1);
        assert!(h.reconciler.check_resolution(&id).await);
        assert!(!h.reconciler.check_resolution(&id).await);

        let results = h.reconciler.get(&id).unwrap().epoch_results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].goal_team, "Arsenal");
        assert_eq!(results[0].cards, "Yes cards");
        assert_eq!(h.reconciler.stats().markets_resolved, 1);
    }

    #[tokio::test]
    async fn placeholder_address_ids_are_not_checked() {
        let h = harness();
        h.reconciler
            .seed(vec![Market::new("9", "A", "B").with_start_time(NOW)]);
        assert!(!h.reconciler.spawn_resolution_check("9"));
    }
}

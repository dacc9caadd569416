//! Market module for epoch-scoped match markets.
//!
//! This module handles:
//! - Market types and data structures
//! - The epoch clock and trading status
//! - Display category derivation
//! - Pool payout arithmetic
//! - Seed fixtures

pub mod category;
pub mod epoch;
pub mod payout;
pub mod seed;
pub mod types;

pub use category::{categorize, is_visible_in};
pub use epoch::{
    compute_epoch, Clock, EpochInfo, ManualClock, SystemClock, TradingStatus, EPOCH_COUNT,
};
pub use seed::seed_markets;
pub use types::{
    CardOutcome, Category, EpochResult, EpochResults, EventType, GoalOutcome, Market,
    PENDING_RESULT,
};

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

/// Whether `id` looks like a contract address.
pub fn is_address_shaped(id: &str) -> bool {
    ADDRESS_PATTERN.is_match(id)
}

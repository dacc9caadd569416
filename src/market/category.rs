//! Display category derivation.

use super::epoch::{compute_epoch, TradingStatus};
use super::types::{Category, Market};

/// Derive the display category of `market` at `now` (unix seconds).
///
/// An explicit `resolved` status always wins. A scheduled market follows the
/// epoch clock: only `Upcoming` maps to [`Category::Upcoming`], every other
/// trading status stays [`Category::Live`] until something resolves it.
/// Unscheduled markets fall back to their explicit tag and otherwise park
/// under [`Category::Resolved`].
pub fn categorize(market: &Market, now: i64) -> Category {
    if market.status == Some(Category::Resolved) {
        return Category::Resolved;
    }

    if market.match_start_time.is_some() {
        return match compute_epoch(now, market.match_start_time).status {
            TradingStatus::Upcoming => Category::Upcoming,
            TradingStatus::Open | TradingStatus::Paused | TradingStatus::Closed => Category::Live,
        };
    }

    match market.status {
        Some(Category::Live) => Category::Live,
        Some(Category::Upcoming) => Category::Upcoming,
        _ => Category::Resolved,
    }
}

/// Whether `market` belongs in the view for `category` at `now`.
///
/// Uses a fresh [`categorize`] rather than the cached page, and never admits
/// an upcoming market without a start time.
pub fn is_visible_in(market: &Market, category: Category, now: i64) -> bool {
    if market.is_unscheduled_placeholder() {
        return false;
    }
    if category == Category::Upcoming && market.match_start_time.is_none() {
        return false;
    }
    categorize(market, now) == category
}

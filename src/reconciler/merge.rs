//! Pure merge rules over the market table.
//!
//! Every function works on a caller-owned copy; the reconciler publishes the
//! copy as a new snapshot only when something changed.

use std::cmp::Ordering;

use crate::backend::MarketRecord;
use crate::market::{categorize, is_visible_in, Category, EpochResult, Market};

/// The reconciled collection of markets, in first-seen order.
pub type MarketTable = Vec<Market>;

/// Position of market `id` in `table`.
pub fn position_of(table: &[Market], id: &str) -> Option<usize> {
    table.iter().position(|m| m.id == id)
}

/// Add seed markets that are not already tracked. Schedule-less upcoming
/// placeholders are dropped. Returns whether the table grew.
pub fn apply_seed(table: &mut MarketTable, seeds: Vec<Market>, now: i64) -> bool {
    let mut changed = false;
    for mut seed in seeds {
        if seed.is_unscheduled_placeholder() || position_of(table, &seed.id).is_some() {
            continue;
        }
        seed.page = Some(categorize(&seed, now));
        table.push(seed);
        changed = true;
    }
    changed
}

/// Upsert backend rows into the table.
///
/// Identity, team, image and schedule come from the row. Known results and
/// explicit status are kept. Rows missing from the feed are left alone.
/// Returns the keys of rows that were inserted or changed.
pub fn apply_feed(table: &mut MarketTable, rows: &[MarketRecord], now: i64) -> Vec<String> {
    let mut touched = Vec::new();

    for row in rows {
        if !row.is_complete() {
            continue;
        }
        let incoming = row.to_market();

        match position_of(table, &incoming.id) {
            Some(i) => {
                let existing = &mut table[i];
                let mut updated = existing.clone();
                updated.team1 = incoming.team1;
                updated.team2 = incoming.team2;
                updated.image = incoming.image;
                if incoming.match_start_time.is_some() {
                    updated.match_start_time = incoming.match_start_time;
                }
                updated.page = Some(categorize(&updated, now));

                if updated != *existing {
                    *existing = updated;
                    touched.push(existing.id.clone());
                }
            }
            None => {
                let mut market = incoming;
                market.page = Some(categorize(&market, now));
                touched.push(market.id.clone());
                table.push(market);
            }
        }
    }

    touched
}

/// Merge on-chain results into market `id` and mark it resolved.
///
/// Empty `results` or an unknown id change nothing. Returns whether the
/// market changed.
pub fn merge_resolution(
    table: &mut MarketTable,
    id: &str,
    results: Vec<EpochResult>,
    now: i64,
) -> bool {
    if results.is_empty() {
        return false;
    }
    let Some(i) = position_of(table, id) else {
        return false;
    };

    let market = &mut table[i];
    let added = market.merge_epoch_results(results);
    let newly_resolved = market.status != Some(Category::Resolved);
    market.status = Some(Category::Resolved);
    market.page = Some(categorize(market, now));
    added || newly_resolved
}

/// Recompute every market's cached category. Returns whether any changed.
pub fn recategorize(table: &mut MarketTable, now: i64) -> bool {
    let mut changed = false;
    for market in table.iter_mut() {
        let page = Some(categorize(market, now));
        if market.page != page {
            market.page = page;
            changed = true;
        }
    }
    changed
}

/// Compare start times ascending, unscheduled markets last.
pub fn by_start_time(a: &Market, b: &Market) -> Ordering {
    match (a.match_start_time, b.match_start_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Markets visible under `category` at `now`, sorted by start time.
pub fn select(table: &[Market], category: Category, now: i64) -> Vec<Market> {
    let mut view: Vec<Market> = table
        .iter()
        .filter(|m| is_visible_in(m, category, now))
        .cloned()
        .collect();
    view.sort_by(by_start_time);
    view
}

/// Markets in `table` sorted by start time, all categories.
pub fn sorted(table: &[Market]) -> Vec<Market> {
    let mut all = table.to_vec();
    all.sort_by(by_start_time);
    all
}

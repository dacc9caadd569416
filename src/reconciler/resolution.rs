//! On-chain resolution lookup for one market.

use alloy::primitives::Address;
use tracing::{debug, instrument, warn};

use crate::chain::{ChainReader, PoolDetails};
use crate::market::{CardOutcome, EpochResult, EventType, EPOCH_COUNT, PENDING_RESULT};
use crate::metrics;

/// Build the result of one epoch from its two pools.
///
/// Either resolved pool is enough; the other side reads [`PENDING_RESULT`].
/// Goal outcome 0 is `team1`, 1 is `team2`.
pub fn epoch_result(
    epoch: u8,
    goal: &PoolDetails,
    cards: &PoolDetails,
    team1: &str,
    team2: &str,
) -> Option<EpochResult> {
    let goal_team = goal
        .resolved
        .then_some(goal.winning_outcome)
        .and_then(|outcome| match outcome {
            0 => Some(team1),
            1 => Some(team2),
            _ => None,
        });
    let cards = cards
        .resolved
        .then_some(cards.winning_outcome)
        .and_then(CardOutcome::from_u8)
        .map(|outcome| outcome.label());

    if goal_team.is_none() && cards.is_none() {
        return None;
    }
    Some(EpochResult {
        epoch,
        goal_team: goal_team.unwrap_or(PENDING_RESULT).to_string(),
        cards: cards.unwrap_or(PENDING_RESULT).to_string(),
    })
}

/// Read all epoch pools of `market` and return the resolved epochs.
///
/// A failed read only drops its own epoch.
#[instrument(skip(reader, team1, team2), fields(market = %market))]
pub async fn lookup_resolution(
    reader: &dyn ChainReader,
    market: Address,
    team1: &str,
    team2: &str,
) -> Vec<EpochResult> {
    metrics::inc_resolution_checks();
    let mut results = Vec::new();

    for epoch in 1..=EPOCH_COUNT {
        let (goal, cards) = tokio::join!(
            reader.epoch_pool(market, EventType::Goal, epoch),
            reader.epoch_pool(market, EventType::Cards, epoch),
        );

        let (goal, cards) = match (goal, cards) {
            (Ok(goal), Ok(cards)) => (goal, cards),
            (Err(e), _) | (_, Err(e)) => {
                metrics::inc_resolution_failures();
                warn!(epoch, error = %e, "Failed to read epoch pools");
                continue;
            }
        };

        if let Some(result) = epoch_result(epoch, &goal, &cards, team1, team2) {
            results.push(result);
        }
    }

    debug!(resolved = results.len(), "Resolution lookup finished");
    results
}

//! Seed fixtures shown before the backend feed has answered.

use super::epoch::EPOCH_SECONDS;
use super::types::{Category, EpochResult, Market};

const PLACEHOLDER_IMAGE: &str = "placeholder";

fn result(epoch: u8, goal_team: &str, cards: &str) -> EpochResult {
    EpochResult {
        epoch,
        goal_team: goal_team.to_string(),
        cards: cards.to_string(),
    }
}

fn fixture(id: &str, team1: &str, team2: &str) -> Market {
    Market::new(id, team1, team2).with_image(PLACEHOLDER_IMAGE)
}

/// Fixture markets laid out around `now`: four in play, four upcoming (two of
/// them without a kick-off time) and four resolved.
pub fn fixture_markets(now: i64) -> Vec<Market> {
    vec![
        fixture("1", "Arsenal", "Manchester United")
            .with_start_time(now - 10 * 60)
            .with_status(Category::Live),
        fixture("2", "Liverpool", "Chelsea")
            .with_start_time(now - 35 * 60)
            .with_status(Category::Live),
        fixture("3", "Manchester City", "Tottenham")
            .with_start_time(now - 50 * 60)
            .with_status(Category::Live),
        fixture("4", "Newcastle", "Aston Villa")
            .with_start_time(now - 5 * 60)
            .with_status(Category::Live),
        fixture("5", "Atletico Madrid", "Sevilla")
            .with_start_time(now + 2 * 3600)
            .with_status(Category::Upcoming),
        fixture("6", "Juventus", "Napoli")
            .with_start_time(now + 6 * 3600)
            .with_status(Category::Upcoming),
        fixture("7", "Ajax", "PSV").with_status(Category::Upcoming),
        fixture("8", "Benfica", "Porto").with_status(Category::Upcoming),
        fixture("9", "Real Madrid", "Barcelona")
            .with_start_time(now - 2 * 86_400)
            .with_status(Category::Resolved)
            .with_epoch_results([
                result(1, "Real Madrid", "No cards"),
                result(2, "Barcelona", "Yes cards"),
                result(3, "Real Madrid", "No cards"),
            ]),
        fixture("10", "Bayern Munich", "Dortmund")
            .with_status(Category::Resolved)
            .with_epoch_results([
                result(1, "Bayern Munich", "Yes cards"),
                result(2, "Dortmund", "No cards"),
                result(3, "Bayern Munich", "Yes cards"),
            ]),
        fixture("11", "PSG", "Marseille")
            .with_status(Category::Resolved)
            .with_epoch_results([
                result(1, "PSG", "No cards"),
                result(2, "PSG", "Yes cards"),
                result(3, "Marseille", "No cards"),
            ]),
        fixture("12", "Inter Milan", "AC Milan")
            .with_start_time(now - 86_400 - 6 * EPOCH_SECONDS)
            .with_status(Category::Resolved)
            .with_epoch_results([
                result(1, "Inter Milan", "Yes cards"),
                result(2, "Inter Milan", "No cards"),
                result(3, "AC Milan", "Yes cards"),
            ]),
    ]
}

/// Fixture markets with schedule-less upcoming placeholders removed.
pub fn seed_markets(now: i64) -> Vec<Market> {
    fixture_markets(now)
        .into_iter()
        .filter(|market| !market.is_unscheduled_placeholder())
        .collect()
}

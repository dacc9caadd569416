//! Market-related types for epoch-scoped match markets.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumString};

use super::epoch::EPOCH_COUNT;

/// Display bucket a market is shown under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    /// Match started, paused or finished but not yet resolved.
    Live,
    /// Match more than one epoch away.
    Upcoming,
    /// Outcome known.
    Resolved,
}

/// Bet event type as encoded on-chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    /// Which team scores in the epoch.
    Goal = 0,
    /// Whether a card is shown in the epoch.
    Cards = 1,
}

impl EventType {
    /// Both event types, in contract order.
    pub const ALL: [EventType; 2] = [EventType::Goal, EventType::Cards];

    /// Contract encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode the contract encoding.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventType::Goal),
            1 => Some(EventType::Cards),
            _ => None,
        }
    }
}

/// Outcomes of a goal pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalOutcome {
    /// Home side scores.
    TeamA = 0,
    /// Away side scores.
    TeamB = 1,
}

/// Outcomes of a cards pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardOutcome {
    /// No card shown.
    NoCards = 0,
    /// At least one card shown.
    YesCards = 1,
}

impl CardOutcome {
    /// Decode the contract encoding.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CardOutcome::NoCards),
            1 => Some(CardOutcome::YesCards),
            _ => None,
        }
    }

    /// Display text.
    pub fn label(&self) -> &'static str {
        match self {
            CardOutcome::NoCards => "No cards",
            CardOutcome::YesCards => "Yes cards",
        }
    }
}

/// Label of a pool side that has not resolved yet.
pub const PENDING_RESULT: &str = "-";

/// Resolved outcome of one epoch.
///
/// An epoch is recorded as soon as either of its pools resolves; the other
/// side reads [`PENDING_RESULT`] until a later check fills it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochResult {
    /// Epoch number (1..=6).
    pub epoch: u8,
    /// Team that won the goal pool.
    pub goal_team: String,
    /// Cards pool result.
    pub cards: String,
}

impl EpochResult {
    /// Both pools resolved.
    pub fn is_complete(&self) -> bool {
        self.goal_team != PENDING_RESULT && self.cards != PENDING_RESULT
    }

    /// Fill pending sides from `other`. Recorded sides never change.
    fn fill_pending(&mut self, other: &EpochResult) -> bool {
        let mut filled = false;
        if self.goal_team == PENDING_RESULT && other.goal_team != PENDING_RESULT {
            self.goal_team = other.goal_team.clone();
            filled = true;
        }
        if self.cards == PENDING_RESULT && other.cards != PENDING_RESULT {
            self.cards = other.cards.clone();
            filled = true;
        }
        filled
    }
}

/// Per-market epoch results; never more than one entry per epoch.
pub type EpochResults = SmallVec<[EpochResult; EPOCH_COUNT as usize]>;

/// A single match's prediction market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    /// Contract address, or a placeholder for fixtures.
    pub id: String,
    /// Home team.
    pub team1: String,
    /// Away team.
    pub team2: String,
    /// Display asset reference.
    #[serde(default)]
    pub image: String,
    /// Kick-off, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_start_time: Option<i64>,
    /// Explicit category set by a source that already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Category>,
    /// Resolved epochs, ascending by epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_results: Option<EpochResults>,
    /// Last computed category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Category>,
}

impl Market {
    /// Create an unscheduled market with no status.
    pub fn new(id: impl Into<String>, team1: impl Into<String>, team2: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            team1: team1.into(),
            team2: team2.into(),
            image: String::new(),
            match_start_time: None,
            status: None,
            epoch_results: None,
            page: None,
        }
    }

    /// Set the kick-off time.
    pub fn with_start_time(mut self, match_start_time: i64) -> Self {
        self.match_start_time = Some(match_start_time);
        self
    }

    /// Set the explicit status.
    pub fn with_status(mut self, status: Category) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the image reference.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Attach epoch results.
    pub fn with_epoch_results(mut self, results: impl IntoIterator<Item = EpochResult>) -> Self {
        self.merge_epoch_results(results);
        self
    }

    /// A schedule-less upcoming placeholder, never displayed.
    pub fn is_unscheduled_placeholder(&self) -> bool {
        self.status == Some(Category::Upcoming) && self.match_start_time.is_none()
    }

    /// Whether epoch `epoch` has a recorded result.
    pub fn has_result_for(&self, epoch: u8) -> bool {
        self.epoch_results
            .as_ref()
            .is_some_and(|results| results.iter().any(|r| r.epoch == epoch))
    }

    /// Whether epoch `epoch` has a result with both pools resolved.
    pub fn has_complete_result_for(&self, epoch: u8) -> bool {
        self.epoch_results
            .as_ref()
            .is_some_and(|results| results.iter().any(|r| r.epoch == epoch && r.is_complete()))
    }

    /// Merge incoming results. Recorded sides of an epoch are left untouched
    /// and only pending sides get filled, so resolution only ever grows.
    /// Returns whether anything was added.
    pub fn merge_epoch_results(&mut self, incoming: impl IntoIterator<Item = EpochResult>) -> bool {
        let mut added = false;
        for result in incoming {
            if result.epoch == 0 || result.epoch > EPOCH_COUNT {
                continue;
            }
            let results = self.epoch_results.get_or_insert_with(SmallVec::new);
            if let Some(existing) = results.iter_mut().find(|r| r.epoch == result.epoch) {
                added |= existing.fill_pending(&result);
                continue;
            }
            let at = results
                .iter()
                .position(|r| r.epoch > result.epoch)
                .unwrap_or(results.len());
            results.insert(at, result);
            added = true;
        }
        if self.epoch_results.as_ref().is_some_and(|r| r.is_empty()) {
            self.epoch_results = None;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn result(epoch: u8, team: &str) -> EpochResult {
        EpochResult {
            epoch,
            goal_team: team.to_string(),
            cards: "No cards".to_string(),
        }
    }

    #[test]
    fn category_from_string_works() {
        assert_eq!(Category::from_str("live").unwrap(), Category::Live);
        assert_eq!(Category::from_str("UPCOMING").unwrap(), Category::Upcoming);
        assert_eq!(Category::Resolved.to_string(), "resolved");
        assert!(Category::from_str("archived").is_err());
    }

    #[test]
    fn event_type_round_trips_contract_encoding() {
        for event in EventType::ALL {
            assert_eq!(EventType::from_u8(event.as_u8()), Some(event));
        }
        assert_eq!(EventType::from_u8(2), None);
    }

    #[test]
    fn merge_keeps_existing_and_orders_by_epoch() {
        let mut market = Market::new("m", "Arsenal", "Chelsea")
            .with_epoch_results([result(3, "Arsenal"), result(1, "Chelsea")]);

        let added = market.merge_epoch_results([result(1, "Arsenal"), result(2, "Arsenal")]);
        assert!(added);

        let results = market.epoch_results.unwrap();
        let epochs: Vec<u8> = results.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);
        assert_eq!(results[0].goal_team, "Chelsea");
    }

    #[test]
    fn merge_fills_pending_sides_only() {
        let pending_cards = EpochResult {
            epoch: 2,
            goal_team: "Arsenal".to_string(),
            cards: PENDING_RESULT.to_string(),
        };
        let mut market = Market::new("m", "Arsenal", "Chelsea").with_epoch_results([pending_cards]);
        assert!(market.has_result_for(2));
        assert!(!market.has_complete_result_for(2));

        let late = EpochResult {
            epoch: 2,
            goal_team: "Chelsea".to_string(),
            cards: "Yes cards".to_string(),
        };
        assert!(market.merge_epoch_results([late.clone()]));
        assert!(!market.merge_epoch_results([late]));

        let results = market.epoch_results.as_ref().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].goal_team, "Arsenal");
        assert_eq!(results[0].cards, "Yes cards");
        assert!(market.has_complete_result_for(2));
    }

    #[test]
    fn merge_ignores_out_of_range_epochs() {
        let mut market = Market::new("m", "A", "B");
        assert!(!market.merge_epoch_results([result(0, "A"), result(7, "B")]));
        assert!(market.epoch_results.is_none());
    }

    #[test]
    fn market_serializes_camel_case() {
        let market = Market::new("0xabc", "PSG", "Marseille")
            .with_start_time(1_700_000_000)
            .with_status(Category::Upcoming);
        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["matchStartTime"], 1_700_000_000);
        assert_eq!(json["status"], "upcoming");
        assert!(json.get("epochResults").is_none());
    }

    #[test]
    fn placeholder_detection() {
        let placeholder = Market::new("x", "A", "B").with_status(Category::Upcoming);
        assert!(placeholder.is_unscheduled_placeholder());
        assert!(!placeholder.with_start_time(1).is_unscheduled_placeholder());
    }
}

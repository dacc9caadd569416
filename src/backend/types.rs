//! Wire types of the persistence store.

use serde::{Deserialize, Serialize};

use crate::market::Market;

/// Image reference used when a record carries none.
pub const DEFAULT_IMAGE: &str = "placeholder";

/// One persisted market row.
///
/// Optional columns may arrive as `null` or be missing altogether.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    /// Row identifier, usually the contract address.
    pub id: String,
    /// Contract address, when known.
    #[serde(default)]
    pub address: Option<String>,
    /// Home team.
    pub team1: String,
    /// Away team.
    pub team2: String,
    /// Display image.
    #[serde(default)]
    pub image: Option<String>,
    /// Kick-off, unix seconds.
    #[serde(default)]
    pub match_start_time: Option<i64>,
    /// Block the creation transaction was mined in.
    #[serde(default)]
    pub from_block: Option<u64>,
    /// Server-assigned creation time, unix milliseconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Free-text market terms.
    #[serde(default)]
    pub market_terms: Option<String>,
    /// League the match belongs to.
    #[serde(default)]
    pub league_name: Option<String>,
}

impl MarketRecord {
    /// Create a record with the required fields only.
    pub fn new(id: impl Into<String>, team1: impl Into<String>, team2: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: None,
            team1: team1.into(),
            team2: team2.into(),
            image: None,
            match_start_time: None,
            from_block: None,
            created_at: None,
            market_terms: None,
            league_name: None,
        }
    }

    /// Required fields present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty() && !self.team1.trim().is_empty() && !self.team2.trim().is_empty()
    }

    /// Key the market is tracked under: the address when known, else the id.
    pub fn market_key(&self) -> &str {
        match self.address.as_deref() {
            Some(address) if !address.is_empty() => address,
            _ => &self.id,
        }
    }

    /// Convert into a fresh [`Market`]. No status or results are implied.
    pub fn to_market(&self) -> Market {
        let mut market = Market::new(self.market_key(), &self.team1, &self.team2)
            .with_image(self.image.as_deref().unwrap_or(DEFAULT_IMAGE));
        if let Some(start) = self.match_start_time.filter(|t| *t > 0) {
            market = market.with_start_time(start);
        }
        market
    }
}

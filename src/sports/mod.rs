//! Upcoming-match feed for market creation.

pub mod badges;
pub mod client;
pub mod types;

pub use badges::{well_known_badge, BadgeSearch, TeamBadgeCache};
pub use client::{fallback_matches, select_upcoming, SportsClient, LEAGUE_IDS, MAX_MATCHES};
pub use types::{format_timestamp, parse_event_time, Match};

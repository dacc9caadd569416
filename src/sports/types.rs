//! Match feed types and event time parsing.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// An upcoming fixture, ready for market creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Feed event id.
    pub id: String,
    /// Home team.
    pub home_team: String,
    /// Away team.
    pub away_team: String,
    /// League name.
    pub league: String,
    /// Kick-off, RFC 3339.
    pub match_time: String,
    /// Kick-off, unix seconds.
    pub timestamp: i64,
    /// Feed status text.
    pub status: String,
    /// Competition name.
    pub competition: String,
    /// Venue, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Home badge URL, empty when unknown.
    pub home_team_badge: String,
    /// Away badge URL, empty when unknown.
    pub away_team_badge: String,
}

impl Match {
    /// Fixture without badges.
    pub fn new(
        id: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        league: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        let league = league.into();
        Self {
            id: id.into(),
            home_team: home_team.into(),
            away_team: away_team.into(),
            competition: league.clone(),
            league,
            match_time: format_timestamp(timestamp),
            timestamp,
            status: "Scheduled".to_string(),
            venue: None,
            home_team_badge: String::new(),
            away_team_badge: String::new(),
        }
    }
}

/// `eventsnextleague` response.
#[derive(Debug, Deserialize)]
pub(crate) struct EventsResponse {
    pub events: Option<Vec<RawEvent>>,
}

/// One event as the feed returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawEvent {
    #[serde(rename = "idEvent")]
    pub id: String,
    #[serde(rename = "strHomeTeam")]
    pub home_team: Option<String>,
    #[serde(rename = "strAwayTeam")]
    pub away_team: Option<String>,
    #[serde(rename = "strLeague")]
    pub league: Option<String>,
    #[serde(rename = "strTimestamp")]
    pub timestamp: Option<String>,
    pub date_event: Option<String>,
    #[serde(rename = "strTime")]
    pub time: Option<String>,
    #[serde(rename = "strStatus")]
    pub status: Option<String>,
    #[serde(rename = "strVenue")]
    pub venue: Option<String>,
}

impl RawEvent {
    /// Kick-off from the full timestamp, else from date and time.
    pub fn kickoff(&self) -> Option<i64> {
        if let Some(ts) = self.timestamp.as_deref().filter(|s| !s.is_empty()) {
            if let Some(secs) = parse_event_time(ts) {
                return Some(secs);
            }
        }
        let date = self.date_event.as_deref()?;
        let time = self.time.as_deref().unwrap_or("00:00:00");
        parse_event_time(&format!("{date}T{time}"))
    }

    /// Convert to a [`Match`]; `None` when teams or kick-off are missing.
    pub fn into_match(self) -> Option<Match> {
        let timestamp = self.kickoff()?;
        let home = self.home_team.filter(|t| !t.is_empty())?;
        let away = self.away_team.filter(|t| !t.is_empty())?;
        let mut m = Match::new(self.id, home, away, self.league.unwrap_or_default(), timestamp);
        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            m.status = status;
        }
        m.venue = self.venue.filter(|v| !v.is_empty());
        Some(m)
    }
}

/// `searchteams` response.
#[derive(Debug, Deserialize)]
pub(crate) struct TeamsResponse {
    pub teams: Option<Vec<RawTeam>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTeam {
    #[serde(rename = "strTeamBadge")]
    pub badge: Option<String>,
}

/// Parse a feed time: RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` read as UTC.
pub fn parse_event_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt.unix_timestamp());
    }
    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let short = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    // Drop a trailing offset the naive formats cannot read.
    let trimmed = raw
        .get(..19)
        .filter(|_| raw.len() > 19 && raw.is_char_boundary(19))
        .unwrap_or(raw);
    PrimitiveDateTime::parse(trimmed, naive)
        .or_else(|_| PrimitiveDateTime::parse(trimmed, short))
        .ok()
        .map(|dt| dt.assume_utc().unix_timestamp())
}

/// RFC 3339 rendering of a unix timestamp.
pub fn format_timestamp(secs: i64) -> String {
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

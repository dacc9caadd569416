//! Upcoming-match feed over the sports data API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::badges::{BadgeSearch, TeamBadgeCache};
use super::types::{EventsResponse, Match, TeamsResponse};
use crate::error::SportsError;
use crate::metrics;

/// Leagues polled for fixtures: EPL, La Liga, Bundesliga, Serie A, Ligue 1.
pub const LEAGUE_IDS: [&str; 5] = ["4328", "4335", "4331", "4332", "4334"];

/// Most matches returned by one feed read.
pub const MAX_MATCHES: usize = 20;

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Built-in fixtures served when no league returns data.
pub fn fallback_matches(now: i64) -> Vec<Match> {
    vec![
        Match::new("1", "Manchester United", "Liverpool", "Premier League", now + 2 * HOUR),
        Match::new("2", "Barcelona", "Real Madrid", "La Liga", now + DAY),
        Match::new("3", "Bayern Munich", "Borussia Dortmund", "Bundesliga", now + 2 * DAY),
        Match::new("4", "PSG", "Marseille", "Ligue 1", now + 6 * HOUR),
        Match::new("5", "AC Milan", "Inter Milan", "Serie A", now + 3 * DAY),
    ]
}

/// Keep future matches, first occurrence per id, soonest first, capped.
pub fn select_upcoming(matches: Vec<Match>, now: i64) -> Vec<Match> {
    let mut seen = HashSet::new();
    let mut upcoming: Vec<Match> = matches
        .into_iter()
        .filter(|m| m.timestamp > now)
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    upcoming.sort_by_key(|m| m.timestamp);
    upcoming.truncate(MAX_MATCHES);
    upcoming
}

/// Client for the sports data API.
#[derive(Debug, Clone)]
pub struct SportsClient {
    http: reqwest::Client,
    base_url: Url,
    badges: Arc<TeamBadgeCache>,
}

impl SportsClient {
    /// Create a client for `base_url` sharing `badges`.
    pub fn new(base_url: &str, badges: Arc<TeamBadgeCache>) -> Result<Self, SportsError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SportsError::InvalidUrl(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(3))
            .build()?;

        Ok(Self {
            http,
            base_url,
            badges,
        })
    }

    /// Badge cache in use.
    pub fn badges(&self) -> &Arc<TeamBadgeCache> {
        &self.badges
    }

    fn endpoint(&self, name: &str, query: (&str, &str)) -> Result<Url, SportsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SportsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(name);
        url.query_pairs_mut().append_pair(query.0, query.1);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, op: &'static str) -> Result<T, SportsError> {
        let start = Instant::now();
        let response = self.http.get(url).send().await?;
        metrics::record_http_latency(start, op);
        if !response.status().is_success() {
            return Err(SportsError::Status(response.status().as_u16()));
        }
        Ok(response.json::<T>().await?)
    }

    /// Next fixtures of one league, with badges.
    #[instrument(skip(self))]
    pub async fn league_matches(&self, league_id: &str) -> Result<Vec<Match>, SportsError> {
        let url = self.endpoint("eventsnextleague.php", ("id", league_id))?;
        let body: EventsResponse = self.get_json(url, "league_events").await?;

        let matches: Vec<Match> = body
            .events
            .unwrap_or_default()
            .into_iter()
            .filter_map(|event| {
                let id = event.id.clone();
                let m = event.into_match();
                if m.is_none() {
                    debug!(event = %id, "Skipping event without teams or kick-off");
                }
                m
            })
            .collect();
        debug!(count = matches.len(), "League fixtures fetched");
        Ok(self.with_badges(matches).await)
    }

    /// Upcoming matches across all leagues, falling back to built-in
    /// fixtures when no league returns anything.
    pub async fn upcoming_matches(&self, now: i64) -> Vec<Match> {
        let mut all = Vec::new();
        for league in LEAGUE_IDS {
            match self.league_matches(league).await {
                Ok(matches) => all.extend(matches),
                Err(e) => warn!(league, error = %e, "League fetch failed"),
            }
        }

        if all.is_empty() {
            info!("No fixtures from the feed, using built-in matches");
            all = self.with_badges(fallback_matches(now)).await;
        }
        select_upcoming(all, now)
    }

    async fn with_badges(&self, matches: Vec<Match>) -> Vec<Match> {
        join_all(matches.into_iter().map(|mut m| async move {
            let (home, away) = tokio::join!(
                self.badges.resolve(&m.home_team, self),
                self.badges.resolve(&m.away_team, self),
            );
            m.home_team_badge = home;
            m.away_team_badge = away;
            m
        }))
        .await
    }
}

#[async_trait]
impl BadgeSearch for SportsClient {
    async fn search_badge(&self, team: &str) -> Result<Option<String>, SportsError> {
        let url = self.endpoint("searchteams.php", ("t", team))?;
        let body: TeamsResponse = self.get_json(url, "search_team").await?;
        Ok(body
            .teams
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|team| team.badge)
            .filter(|badge| !badge.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_760_000_000;

    #[test]
    fn selection_filters_dedupes_and_sorts() {
        let matches = vec![
            Match::new("a", "A", "B", "L", NOW + 300),
            Match::new("past", "C", "D", "L", NOW - 10),
            Match::new("b", "E", "F", "L", NOW + 100),
            Match::new("a", "A", "B", "L", NOW + 900),
            Match::new("kickoff", "G", "H", "L", NOW),
        ];
        let ids: Vec<String> = select_upcoming(matches, NOW).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn selection_caps_results() {
        let matches = (0..30)
            .map(|i| Match::new(i.to_string(), "A", "B", "L", NOW + 60 + i))
            .collect();
        assert_eq!(select_upcoming(matches, NOW).len(), MAX_MATCHES);
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = SportsClient::new(
            "https://www.thesportsdb.com/api/v1/json/3/",
            Arc::new(TeamBadgeCache::new()),
        )
        .unwrap();
        let url = client.endpoint("searchteams.php", ("t", "Inter Milan")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.thesportsdb.com/api/v1/json/3/searchteams.php?t=Inter+Milan"
        );
    }

    #[tokio::test]
    async fn unreachable_feed_falls_back_to_fixtures() {
        let client = SportsClient::new("http://127.0.0.1:9", Arc::new(TeamBadgeCache::new())).unwrap();
        let matches = client.upcoming_matches(NOW).await;

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4", "2", "3", "5"]);
        assert!(matches[0].home_team_badge.ends_with("xtwxyt1421431910.png"));
    }
}

//! Epoch clock: maps wall-clock time and a match start time to a betting
//! epoch and trading status.
//!
//! Windows, in minutes relative to kick-off (lower bound inclusive):
//!
//! ```text
//! (-inf, -15)  -> Upcoming
//! [-15,   0)   -> epoch 1, Open
//! [  0,  15)   -> epoch 2, Open
//! [ 15,  30)   -> epoch 3, Open
//! [ 30,  45)   -> epoch 4, Paused (halftime)
//! [ 45,  60)   -> epoch 5, Open
//! [ 60,  75)   -> epoch 6, Open
//! [ 75, +inf)  -> Closed
//! ```

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Length of one epoch in seconds.
pub const EPOCH_SECONDS: i64 = 15 * 60;

/// Number of epochs in a match.
pub const EPOCH_COUNT: u8 = 6;

/// Epoch reserved for the halftime pause.
pub const HALFTIME_EPOCH: u8 = 4;

/// Trading status for a market at a point in time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum TradingStatus {
    /// More than one epoch before kick-off.
    Upcoming,
    /// Stakes accepted.
    Open,
    /// Halftime, no stakes.
    Paused,
    /// All epochs elapsed, or no start time known.
    Closed,
}

impl TradingStatus {
    /// Whether a stake may be placed in this status.
    pub fn accepts_stakes(&self) -> bool {
        matches!(self, TradingStatus::Open)
    }
}

/// Result of [`compute_epoch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    /// Current epoch (1-indexed), if inside the match window.
    pub epoch: Option<u8>,
    /// Trading status.
    pub status: TradingStatus,
}

/// Compute the epoch and trading status for `now` (unix seconds).
///
/// Works in whole seconds so boundaries are exact: kick-off itself is epoch 2.
pub fn compute_epoch(now: i64, match_start_time: Option<i64>) -> EpochInfo {
    let Some(start) = match_start_time else {
        return EpochInfo {
            epoch: None,
            status: TradingStatus::Closed,
        };
    };

    let elapsed = now.saturating_sub(start);

    if elapsed < -EPOCH_SECONDS {
        return EpochInfo {
            epoch: None,
            status: TradingStatus::Upcoming,
        };
    }

    // Shift so epoch 1 starts at zero.
    let index = elapsed.saturating_add(EPOCH_SECONDS).div_euclid(EPOCH_SECONDS);
    if index >= i64::from(EPOCH_COUNT) {
        return EpochInfo {
            epoch: None,
            status: TradingStatus::Closed,
        };
    }

    let epoch = index as u8 + 1;
    let status = if epoch == HALFTIME_EPOCH {
        TradingStatus::Paused
    } else {
        TradingStatus::Open
    };

    EpochInfo {
        epoch: Some(epoch),
        status,
    }
}

/// Offsets from kick-off, in seconds, of the `[start, end)` window of `epoch`.
pub fn epoch_window(epoch: u8) -> Option<(i64, i64)> {
    if epoch == 0 || epoch > EPOCH_COUNT {
        return None;
    }
    let start = (i64::from(epoch) - 2) * EPOCH_SECONDS;
    Some((start, start + EPOCH_SECONDS))
}

/// Display label of an epoch window, e.g. `"15-30 min"`.
pub fn epoch_period_label(epoch: u8) -> Option<String> {
    let (start, end) = epoch_window(epoch)?;
    if start < 0 {
        return Some("pre-match".to_string());
    }
    Some(format!("{}-{} min", start / 60, end / 60))
}

/// Seconds until the trading status next changes, or `None` once closed.
pub fn seconds_until_transition(now: i64, match_start_time: Option<i64>) -> Option<i64> {
    let start = match_start_time?;
    let info = compute_epoch(now, Some(start));
    let boundary = match info.epoch {
        Some(epoch) => start.saturating_add(epoch_window(epoch)?.1),
        None if info.status == TradingStatus::Upcoming => start.saturating_sub(EPOCH_SECONDS),
        None => return None,
    };
    Some(boundary.saturating_sub(now))
}

/// Format a countdown as "Xm Ys", or "CLOSED".
pub fn countdown_str(now: i64, match_start_time: Option<i64>) -> String {
    match seconds_until_transition(now, match_start_time) {
        Some(secs) if secs > 0 => format!("{}m {}s", secs / 60, secs % 60),
        _ => "CLOSED".to_string(),
    }
}

/// Source of the current unix time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current unix time in seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Set the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn at_minutes(diff_minutes: i64) -> EpochInfo {
        compute_epoch(NOW, Some(NOW - diff_minutes * 60))
    }

    #[test]
    fn missing_start_time_is_closed() {
        let info = compute_epoch(NOW, None);
        assert_eq!(info.epoch, None);
        assert_eq!(info.status, TradingStatus::Closed);
    }

    #[test]
    fn table_rows_match() {
        let cases = [
            (-16, None, TradingStatus::Upcoming),
            (-15, Some(1), TradingStatus::Open),
            (-1, Some(1), TradingStatus::Open),
            (0, Some(2), TradingStatus::Open),
            (15, Some(3), TradingStatus::Open),
            (30, Some(4), TradingStatus::Paused),
            (44, Some(4), TradingStatus::Paused),
            (45, Some(5), TradingStatus::Open),
            (60, Some(6), TradingStatus::Open),
            (74, Some(6), TradingStatus::Open),
            (75, None, TradingStatus::Closed),
            (600, None, TradingStatus::Closed),
        ];

        for (diff, epoch, status) in cases {
            let info = at_minutes(diff);
            assert_eq!(info.epoch, epoch, "epoch at {diff} min");
            assert_eq!(info.status, status, "status at {diff} min");
        }
    }

    #[test]
    fn extreme_timestamps_saturate() {
        let info = compute_epoch(NOW, Some(i64::MIN));
        assert_eq!(info.epoch, None);
        assert_eq!(info.status, TradingStatus::Closed);
        assert_eq!(countdown_str(NOW, Some(i64::MIN)), "CLOSED");

        let info = compute_epoch(i64::MAX, Some(i64::MIN));
        assert_eq!(info.status, TradingStatus::Closed);

        let info = compute_epoch(i64::MIN, Some(i64::MAX));
        assert_eq!(info.status, TradingStatus::Upcoming);
        assert!(seconds_until_transition(i64::MIN, Some(i64::MAX)).is_some());
    }

    #[test]
    fn boundaries_are_half_open_to_the_second() {
        assert_eq!(compute_epoch(NOW, Some(NOW)).epoch, Some(2));
        assert_eq!(compute_epoch(NOW, Some(NOW + 1)).epoch, Some(1));
        assert_eq!(
            compute_epoch(NOW, Some(NOW + 15 * 60)).status,
            TradingStatus::Open
        );
        assert_eq!(
            compute_epoch(NOW, Some(NOW + 15 * 60 + 1)).status,
            TradingStatus::Upcoming
        );
        assert_eq!(
            compute_epoch(NOW, Some(NOW - 75 * 60 + 1)).epoch,
            Some(6)
        );
    }

    #[test]
    fn scenarios() {
        assert_eq!(at_minutes(20).epoch, Some(3));
        assert_eq!(compute_epoch(NOW, Some(NOW - 20 * 60)).status, TradingStatus::Open);

        let paused = compute_epoch(NOW, Some(NOW - 40 * 60));
        assert_eq!(paused.epoch, Some(4));
        assert!(!paused.status.accepts_stakes());

        let future = compute_epoch(NOW, Some(NOW + 1000));
        assert_eq!(future.epoch, None);
        assert_eq!(future.status, TradingStatus::Upcoming);

        let finished = compute_epoch(NOW, Some(NOW - 80 * 60));
        assert_eq!(finished.epoch, None);
        assert_eq!(finished.status, TradingStatus::Closed);
    }

    #[test]
    fn epoch_labels() {
        assert_eq!(epoch_period_label(1).as_deref(), Some("pre-match"));
        assert_eq!(epoch_period_label(2).as_deref(), Some("0-15 min"));
        assert_eq!(epoch_period_label(3).as_deref(), Some("15-30 min"));
        assert_eq!(epoch_period_label(0), None);
        assert_eq!(epoch_period_label(7), None);
    }

    #[test]
    fn countdown_tracks_next_boundary() {
        let start = NOW + 20 * 60;
        assert_eq!(seconds_until_transition(NOW, Some(start)), Some(5 * 60));
        assert_eq!(countdown_str(NOW, Some(NOW - 10 * 60)), "5m 0s");
        assert_eq!(countdown_str(NOW, Some(NOW - 90 * 60)), "CLOSED");
        assert_eq!(countdown_str(NOW, None), "CLOSED");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now(), 150);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }
}

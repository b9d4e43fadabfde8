//! Market-hours gate
//!
//! The spot gold market trades continuously except for the weekend break:
//! closed from Friday 22:00 UTC until Sunday 22:00 UTC. Cycles evaluated
//! while the market is closed would only rediscover the last traded bar, so
//! the runner skips them when the gate is enabled.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Whether the market is open at `now` (UTC weekly schedule).
pub fn is_open(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Sat => false,
        Weekday::Fri => now.hour() < 22,
        Weekday::Sun => now.hour() >= 22,
        _ => true,
    }
}

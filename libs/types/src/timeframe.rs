//! Bar durations (timeframes)
//!
//! Timeframes render to the interval strings used by the upstream OHLC API and
//! the bar cache filenames ("5min", "15min", "1h", ...). Ordering in a
//! multi-timeframe configuration is fastest first.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M5,
    M15,
    H1,
    /// Arbitrary bar duration in minutes.
    Minutes(u32),
}

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::Minutes(m) => *m,
        }
    }

    /// Interval string in the upstream API's notation.
    pub fn interval(&self) -> String {
        match self {
            Timeframe::H1 => "1h".to_string(),
            Timeframe::Minutes(m) if m % 60 == 0 => format!("{}h", m / 60),
            other => format!("{}min", other.minutes()),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interval())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let s = value.trim();
        let minutes = if let Some(m) = s.strip_suffix("min") {
            m.parse::<u32>().map_err(|_| bad_interval(s))?
        } else if let Some(h) = s.strip_suffix('h') {
            h.parse::<u32>().map_err(|_| bad_interval(s))? * 60
        } else {
            return Err(bad_interval(s));
        };
        if minutes == 0 {
            return Err(bad_interval(s));
        }
        Ok(match minutes {
            5 => Timeframe::M5,
            15 => Timeframe::M15,
            60 => Timeframe::H1,
            m => Timeframe::Minutes(m),
        })
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.interval()
    }
}

fn bad_interval(s: &str) -> String {
    format!("invalid interval '{s}': expected '<n>min' or '<n>h'")
}

//! Outbound signal events and the webhook wire payload
//!
//! The JSON field names (`signal_type`, `ema_trend`, ...) are the webhook
//! contract of the receiving alert relay and must not change.

use crate::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Wire value of the `signal_type` payload field.
    pub fn signal_type(&self) -> &'static str {
        match self {
            Direction::Long => "longSignal",
            Direction::Short => "shortSignal",
        }
    }

    /// Trend sign this direction requires (+1 long, -1 short).
    pub fn trend_sign(&self) -> i8 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signal_type())
    }
}

/// A confirmed directional signal ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Close of the most recent bar on the reporting timeframe.
    pub price: f64,
    /// Trend state of the reporting timeframe at the signal bar.
    pub trend: i8,
    /// RSI at the signal bar, absent during warm-up.
    pub rsi: Option<f64>,
    /// Timestamp of the bar that produced the signal.
    pub bar_time: DateTime<Utc>,
}

impl SignalEvent {
    /// Identity string hashed into the deterministic signal id.
    ///
    /// Same logical event (symbol, timeframe, direction, bar) must always
    /// produce the same string.
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.symbol,
            self.timeframe,
            self.direction.signal_type(),
            self.bar_time.timestamp()
        )
    }

    pub fn payload(&self, signal_id: &str) -> SignalPayload {
        SignalPayload {
            signal_type: self.direction.signal_type().to_string(),
            price: self.price,
            ema_trend: self.trend,
            rsi: self.rsi,
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.interval(),
            bar_time: self.bar_time,
            signal_id: signal_id.to_string(),
        }
    }
}

/// JSON body POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub signal_type: String,
    pub price: f64,
    pub ema_trend: i8,
    pub rsi: Option<f64>,
    pub symbol: String,
    pub timeframe: String,
    pub bar_time: DateTime<Utc>,
    pub signal_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> SignalEvent {
        SignalEvent {
            symbol: "XAU/USD".to_string(),
            timeframe: Timeframe::M5,
            direction: Direction::Long,
            price: 1925.5,
            trend: 1,
            rsi: Some(64.2),
            bar_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn identity_is_deterministic() {
        assert_eq!(event().identity(), event().identity());
        assert_eq!(event().identity(), "XAU/USD|5min|longSignal|1700000000");
    }

    #[test]
    fn payload_keeps_wire_field_names() {
        let json = serde_json::to_value(event().payload("abc123")).unwrap();
        assert_eq!(json["signal_type"], "longSignal");
        assert_eq!(json["ema_trend"], 1);
        assert_eq!(json["signal_id"], "abc123");
    }
}

//! Multi-timeframe agreement
//!
//! Combines per-timeframe snapshots into one directional decision per cycle.
//! Two confirmation policies are supported as configuration; exactly one is
//! active. When long and short would both qualify in the same cycle the
//! decision is `None`, a conservative and testable tie-break.

use crate::signals::SignalSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use trendwire_types::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AgreementPolicy {
    /// Fire when at least `min_agree` timeframes show an entry within their
    /// most recent `lookback` bars.
    CountThreshold { min_agree: usize, lookback: usize },

    /// Fire when the fastest timeframe shows a recent entry and the slowest
    /// timeframe's *trend state* already points the same way.
    HtfConfirmation { lookback: usize },
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        AgreementPolicy::CountThreshold {
            min_agree: 2,
            lookback: 3,
        }
    }
}

impl AgreementPolicy {
    pub fn validate(&self, timeframe_count: usize) -> Result<(), String> {
        match self {
            AgreementPolicy::CountThreshold { min_agree, lookback } => {
                if *lookback == 0 {
                    return Err("agreement.lookback must be at least 1".to_string());
                }
                if *min_agree == 0 || *min_agree > timeframe_count {
                    return Err(format!(
                        "agreement.min_agree must be in 1..={timeframe_count} for {timeframe_count} timeframes"
                    ));
                }
            }
            AgreementPolicy::HtfConfirmation { lookback } => {
                if *lookback == 0 {
                    return Err("agreement.lookback must be at least 1".to_string());
                }
                if timeframe_count < 2 {
                    return Err(
                        "htf_confirmation needs at least two timeframes (fastest + slowest)"
                            .to_string(),
                    );
                }
            }
        }
        Ok(())
    }

    /// Decide a direction for this cycle. Snapshots are ordered fastest first.
    pub fn decide(&self, snapshots: &[SignalSnapshot]) -> Decision {
        if snapshots.is_empty() {
            return Decision::None;
        }
        let (long_ok, short_ok) = match self {
            AgreementPolicy::CountThreshold { min_agree, lookback } => {
                let longs = snapshots
                    .iter()
                    .filter(|s| s.has_recent_long(*lookback))
                    .count();
                let shorts = snapshots
                    .iter()
                    .filter(|s| s.has_recent_short(*lookback))
                    .count();
                (longs >= *min_agree, shorts >= *min_agree)
            }
            AgreementPolicy::HtfConfirmation { lookback } => {
                let (Some(fastest), Some(slowest)) = (snapshots.first(), snapshots.last())
                else {
                    return Decision::None;
                };
                (
                    fastest.has_recent_long(*lookback) && slowest.last_trend == 1,
                    fastest.has_recent_short(*lookback) && slowest.last_trend == -1,
                )
            }
        };
        match (long_ok, short_ok) {
            (true, true) => Decision::None,
            (true, false) => Decision::Direction(Direction::Long),
            (false, true) => Decision::Direction(Direction::Short),
            (false, false) => Decision::None,
        }
    }
}

/// Directional decision of one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    None,
    Direction(Direction),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::None => f.write_str("none"),
            Decision::Direction(d) => write!(f, "{d}"),
        }
    }
}

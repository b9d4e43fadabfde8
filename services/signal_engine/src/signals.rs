//! Entry detection and per-timeframe signal snapshots
//!
//! An entry is a close crossing the zero-lag EMA *center line* in the
//! direction of an already-established trend: the persisted trend state must
//! confirm the direction on both the signal bar and the bar before it, so
//! entries never fire on the bar that establishes the regime.

use crate::config::IndicatorConfig;
use crate::indicators::{self, IndicatorFrame};
use crate::trend;
use chrono::{DateTime, Utc};
use trendwire_types::{Series, Timeframe};

/// Per-bar entry flags, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryFlags {
    pub long: Vec<bool>,
    pub short: Vec<bool>,
}

/// Detect center-line crossover entries gated by the confirmed trend state.
pub fn detect_entries(closes: &[f64], frame: &IndicatorFrame, trend: &[i8]) -> EntryFlags {
    let len = closes.len();
    let mut flags = EntryFlags {
        long: vec![false; len],
        short: vec![false; len],
    };
    for i in 1..len {
        let (Some(z), Some(z_prev)) = (frame.zlema[i], frame.zlema[i - 1]) else {
            continue;
        };
        flags.long[i] = closes[i] > z
            && closes[i - 1] <= z_prev
            && trend[i] == 1
            && trend[i - 1] == 1;
        flags.short[i] = closes[i] < z
            && closes[i - 1] >= z_prev
            && trend[i] == -1
            && trend[i - 1] == -1;
    }
    flags
}

/// The full evaluation of one timeframe for one cycle: indicator frame, trend
/// states, entry flags, and the last-bar facts the dispatcher reports.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub timeframe: Timeframe,
    pub entries: EntryFlags,
    pub trend: Vec<i8>,
    pub insufficient_history: bool,
    pub last_close: Option<f64>,
    pub last_rsi: Option<f64>,
    pub last_trend: i8,
    pub last_bar_time: Option<DateTime<Utc>>,
    pub zlema: Vec<Option<f64>>,
}

impl SignalSnapshot {
    /// Evaluate one timeframe series end to end.
    pub fn evaluate(timeframe: Timeframe, series: &Series, params: &IndicatorConfig) -> Self {
        let frame = indicators::compute(series, params);
        let closes = series.closes();
        let trend = trend::classify(&closes, &frame, params.bar0_policy);
        let entries = detect_entries(&closes, &frame, &trend);
        Self {
            timeframe,
            last_close: closes.last().copied(),
            last_rsi: frame.rsi.last().copied().flatten(),
            last_trend: trend.last().copied().unwrap_or(0),
            last_bar_time: series.last().map(|b| b.timestamp),
            insufficient_history: frame.insufficient_history,
            zlema: frame.zlema.clone(),
            entries,
            trend,
        }
    }

    /// Any long entry within the most recent `lookback` bars.
    pub fn has_recent_long(&self, lookback: usize) -> bool {
        recent_any(&self.entries.long, lookback)
    }

    pub fn has_recent_short(&self, lookback: usize) -> bool {
        recent_any(&self.entries.short, lookback)
    }
}

fn recent_any(flags: &[bool], lookback: usize) -> bool {
    let start = flags.len().saturating_sub(lookback);
    flags[start..].iter().any(|&f| f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_zlema(zlema: Vec<Option<f64>>) -> IndicatorFrame {
        let len = zlema.len();
        let mut frame = IndicatorFrame::neutral(len);
        frame.insufficient_history = false;
        frame.zlema = zlema;
        frame
    }

    #[test]
    fn long_entry_requires_crossover_and_established_trend() {
        let closes = vec![99.0, 99.5, 101.0, 102.0];
        let zlema = vec![Some(100.0); 4];
        let frame = frame_with_zlema(zlema);

        // Trend established before the crossover bar: entry fires at 2 only.
        let entries = detect_entries(&closes, &frame, &[1, 1, 1, 1]);
        assert_eq!(entries.long, vec![false, false, true, false]);
        assert!(entries.short.iter().all(|&f| !f));

        // Trend established *at* the crossover bar: no entry.
        let entries = detect_entries(&closes, &frame, &[0, 0, 1, 1]);
        assert!(entries.long.iter().all(|&f| !f));
    }

    #[test]
    fn short_entry_mirrors_long() {
        let closes = vec![101.0, 100.5, 99.0, 98.0];
        let frame = frame_with_zlema(vec![Some(100.0); 4]);
        let entries = detect_entries(&closes, &frame, &[-1, -1, -1, -1]);
        assert_eq!(entries.short, vec![false, false, true, false]);
    }

    #[test]
    fn undefined_zlema_blocks_entries() {
        let closes = vec![99.0, 99.5, 101.0];
        let mut zlema = vec![Some(100.0); 3];
        zlema[1] = None;
        let frame = frame_with_zlema(zlema);
        let entries = detect_entries(&closes, &frame, &[1, 1, 1]);
        assert!(entries.long.iter().all(|&f| !f));
    }

    #[test]
    fn entries_are_subset_of_crossover_bars() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + 3.0 * ((i as f64) * 0.7).sin())
            .collect();
        let frame = frame_with_zlema(vec![Some(100.0); 30]);
        let entries = detect_entries(&closes, &frame, &vec![1i8; 30]);
        for i in 1..closes.len() {
            if entries.long[i] {
                assert!(closes[i] > 100.0 && closes[i - 1] <= 100.0);
            }
        }
    }

    #[test]
    fn full_scale_breakout_flips_trend_without_premature_entry() {
        use chrono::{TimeZone, Utc};
        use trendwire_types::{Bar, Series};

        // 300 monotone non-decreasing closes with production parameters: flat
        // warm-up, then a discrete jump once the band is defined. The jump bar
        // crosses the upper band and the center line simultaneously, so the
        // trend flips there but no entry may fire: the prior bar's trend was
        // still neutral.
        let mut closes = vec![100.0; 280];
        closes.extend(std::iter::repeat(115.0).take(20));
        let series = Series::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    Bar::new(
                        Utc.timestamp_opt(i as i64 * 300, 0).unwrap(),
                        c,
                        c + 0.5,
                        c - 0.5,
                        c,
                    )
                })
                .collect(),
        )
        .unwrap();

        let snapshot =
            SignalSnapshot::evaluate(Timeframe::M5, &series, &IndicatorConfig::default());
        assert!(!snapshot.insufficient_history);
        assert!(snapshot.trend[..280].iter().all(|&t| t == 0));
        assert!(snapshot.trend[280..].iter().all(|&t| t == 1));
        assert!(snapshot.entries.long.iter().all(|&f| !f));
        assert!(snapshot.entries.short.iter().all(|&f| !f));
    }

    #[test]
    fn recent_lookback_windows() {
        let snapshot = SignalSnapshot {
            timeframe: Timeframe::M5,
            entries: EntryFlags {
                long: vec![true, false, false, false, false],
                short: vec![false; 5],
            },
            trend: vec![1; 5],
            insufficient_history: false,
            last_close: Some(100.0),
            last_rsi: None,
            last_trend: 1,
            last_bar_time: None,
            zlema: vec![None; 5],
        };
        assert!(!snapshot.has_recent_long(3));
        assert!(snapshot.has_recent_long(5));
        assert!(!snapshot.has_recent_short(5));
    }
}

//! Stateful trend classification
//!
//! A strict left-to-right scan over one series: the state at bar `i` depends
//! only on the resolved state at `i - 1` and the crossover facts of bar `i`.
//! Once flipped, the state persists until an opposite-direction band crossover,
//! even if price re-enters the band. This hysteresis distinguishes the scan
//! from a sign-of-difference classifier. The scan is inherently sequential and
//! must not be vectorized.

use crate::indicators::IndicatorFrame;
use serde::{Deserialize, Serialize};

/// How bar 0 is classified, where no previous-bar crossover test exists.
///
/// The reference pipeline variants disagreed here; the choice is explicit
/// configuration rather than a silent pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bar0Policy {
    /// Bar 0 is always neutral; a trend needs a genuine crossover.
    AlwaysNeutral,
    /// Bar 0 may be classified by simple band threshold, without a crossover.
    DirectClassify,
}

/// Per-bar trend states in {-1, 0, 1}, index-aligned with the input.
pub fn classify(closes: &[f64], frame: &IndicatorFrame, bar0: Bar0Policy) -> Vec<i8> {
    let len = closes.len();
    debug_assert_eq!(frame.len(), len);
    let mut trend = vec![0i8; len];
    if len == 0 {
        return trend;
    }

    trend[0] = match bar0 {
        Bar0Policy::AlwaysNeutral => 0,
        Bar0Policy::DirectClassify => match (frame.upper.first(), frame.lower.first()) {
            (Some(Some(upper)), _) if closes[0] > *upper => 1,
            (_, Some(Some(lower))) if closes[0] < *lower => -1,
            _ => 0,
        },
    };

    for i in 1..len {
        let prev = trend[i - 1];
        // Undetermined zlema holds the previous state unchanged.
        if frame.zlema[i].is_none() {
            trend[i] = prev;
            continue;
        }
        trend[i] = if crossed_over(closes, &frame.upper, i) {
            1
        } else if crossed_under(closes, &frame.lower, i) {
            -1
        } else {
            prev
        };
    }
    trend
}

/// Close moved from at-or-below the line to strictly above it. False when the
/// line is undefined on either bar.
fn crossed_over(closes: &[f64], line: &[Option<f64>], i: usize) -> bool {
    match (line[i], line[i - 1]) {
        (Some(cur), Some(prev)) => closes[i] > cur && closes[i - 1] <= prev,
        _ => false,
    }
}

fn crossed_under(closes: &[f64], line: &[Option<f64>], i: usize) -> bool {
    match (line[i], line[i - 1]) {
        (Some(cur), Some(prev)) => closes[i] < cur && closes[i - 1] >= prev,
        _ => false,
    }
}

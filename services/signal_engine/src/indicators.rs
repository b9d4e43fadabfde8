//! Indicator engine: zero-lag EMA, ATR volatility band, RSI
//!
//! ## Purpose
//!
//! Computes the per-bar indicator values the trend classifier and entry
//! detector consume. All outputs are index-aligned with the input series and
//! warm-up bars are explicit `None`, never a silent zero.
//!
//! ## Contract
//!
//! - Zero-lag EMA: EMA of the de-lagged source `close[i] + (close[i] -
//!   close[i - lag])` with `lag = (ema_length - 1) / 2`, seeded with a simple
//!   average over the first `ema_length` defined inputs.
//! - Volatility half-width: rolling max of the ATR over `ema_length * 3` bars
//!   (backward-looking only), scaled by `band_mult`.
//! - RSI: Wilder smoothing over `rsi_length`, bounded [0, 100].
//! - A series shorter than `ema_length * 3` is never computed: the engine logs
//!   a warning and returns an all-`None` frame of matching length with
//!   `insufficient_history` set, so callers stay index-aligned.

use crate::config::IndicatorConfig;
use tracing::warn;
use trendwire_types::Series;

/// Per-bar indicator values, index-aligned with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub zlema: Vec<Option<f64>>,
    /// Band half-width (rolling-max ATR times `band_mult`).
    pub volatility: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    /// Set when the series was too short to compute anything.
    pub insufficient_history: bool,
}

impl IndicatorFrame {
    /// All-undefined frame for a series that has not warmed up.
    pub fn neutral(len: usize) -> Self {
        Self {
            zlema: vec![None; len],
            volatility: vec![None; len],
            upper: vec![None; len],
            lower: vec![None; len],
            rsi: vec![None; len],
            insufficient_history: true,
        }
    }

    pub fn len(&self) -> usize {
        self.zlema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zlema.is_empty()
    }
}

/// Compute the full indicator frame for one series.
pub fn compute(series: &Series, params: &IndicatorConfig) -> IndicatorFrame {
    let len = series.len();
    if len < params.min_history() {
        warn!(
            bars = len,
            required = params.min_history(),
            "insufficient history for indicators, returning neutral frame"
        );
        return IndicatorFrame::neutral(len);
    }

    let closes = series.closes();
    let lag = (params.ema_length - 1) / 2;
    let src = delagged_source(&closes, lag);
    let zlema = ema(&src, params.ema_length);

    let tr: Vec<Option<f64>> = true_ranges(series).into_iter().map(Some).collect();
    let atr = ema(&tr, params.ema_length);
    let volatility: Vec<Option<f64>> = rolling_max(&atr, params.min_history())
        .into_iter()
        .map(|v| v.map(|m| m * params.band_mult))
        .collect();

    let upper = zip_add(&zlema, &volatility, 1.0);
    let lower = zip_add(&zlema, &volatility, -1.0);
    let rsi = rsi(&closes, params.rsi_length);

    IndicatorFrame {
        zlema,
        volatility,
        upper,
        lower,
        rsi,
        insufficient_history: false,
    }
}

/// De-lagged source series: `close[i] + (close[i] - close[i - lag])`.
fn delagged_source(closes: &[f64], lag: usize) -> Vec<Option<f64>> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i < lag {
                None
            } else {
                Some(c + (c - closes[i - lag]))
            }
        })
        .collect()
}

/// EMA with a simple-average seed over the first `window` defined inputs,
/// then the standard recurrence with `alpha = 2 / (window + 1)`.
///
/// Leading `None` inputs delay the seed; the output stays `None` until the
/// seed window fills.
fn ema(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut prev: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(x) = value else { continue };
        match prev {
            Some(p) => {
                let next = alpha * x + (1.0 - alpha) * p;
                prev = Some(next);
                out[i] = Some(next);
            }
            None => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == window {
                    let seed = seed_sum / window as f64;
                    prev = Some(seed);
                    out[i] = Some(seed);
                }
            }
        }
    }
    out
}

/// Standard true range: greatest of high-low, |high - prev close|,
/// |low - prev close|. Bar 0 has no previous close and uses high-low.
fn true_ranges(series: &Series) -> Vec<f64> {
    let bars = series.bars();
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                let prev_close = bars[i - 1].close;
                (bar.high - bar.low)
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs())
            }
        })
        .collect()
}

/// Rolling maximum over a full backward-looking window. The output is defined
/// only when every value in the window is defined.
fn rolling_max(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in 0..values.len() {
        if i + 1 < window {
            continue;
        }
        let mut max = f64::NEG_INFINITY;
        let mut complete = true;
        for value in &values[i + 1 - window..=i] {
            match value {
                Some(x) => max = max.max(*x),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            out[i] = Some(max);
        }
    }
    out
}

/// Wilder RSI over `window` price changes; `None` for the first `window` bars.
fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() <= window {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=window {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= window as f64;
    avg_loss /= window as f64;
    out[window] = Some(rsi_value(avg_gain, avg_loss));

    for i in window + 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let (gain, loss) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (window - 1) as f64 + gain) / window as f64;
        avg_loss = (avg_loss * (window - 1) as f64 + loss) / window as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Elementwise `a + sign * b`, `None` wherever either side is undefined.
fn zip_add(a: &[Option<f64>], b: &[Option<f64>], sign: f64) -> Vec<Option<f64>> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(x + sign * y),
            _ => None,
        })
        .collect()
}

//! OHLC bars and validated bar series
//!
//! A [`Series`] is the unit of work for the indicator engine: a fixed window of
//! bars, ascending by timestamp, unique timestamps. Construction enforces the
//! ordering invariant so every consumer can index freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single OHLC bar.
///
/// `volume` defaults to 1 for sources that do not report it (spot feeds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default = "default_volume")]
    pub volume: u64,
}

fn default_volume() -> u64 {
    1
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 1,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// Bars were not strictly ascending by timestamp
    #[error("bars out of order at index {index}")]
    OutOfOrder { index: usize },

    /// Two bars carried the same timestamp
    #[error("duplicate timestamp at index {index}")]
    DuplicateTimestamp { index: usize },
}

/// An ordered sequence of bars, ascending by timestamp, unique timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series from bars that must already be strictly ascending.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(SeriesError::DuplicateTimestamp { index: i + 1 });
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::OutOfOrder { index: i + 1 });
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from bars in any order, deduplicating by timestamp.
    ///
    /// On a timestamp collision the later element of `bars` wins, matching the
    /// last-write-wins merge rule of the bar cache.
    pub fn normalized(mut bars: Vec<Bar>) -> Self {
        // Stable sort keeps insertion order within equal timestamps, so the
        // last occurrence survives the backward dedup below.
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices, index-aligned with the bars.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Drop the oldest bars so at most `max` remain.
    pub fn truncate_front(&mut self, max: usize) {
        if self.bars.len() > max {
            self.bars.drain(..self.bars.len() - max);
        }
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

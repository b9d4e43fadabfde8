//! # Trendwire Signal Engine - Multi-Timeframe Trend Signals
//!
//! ## Purpose
//!
//! Evaluates a zero-lag EMA trend system over several timeframes of one
//! instrument and dispatches confirmed entry signals to a webhook receiver,
//! at most once per logical signal. The engine runs unattended on a fixed
//! interval against an OHLC time-series API, caching bar history on disk so
//! restarts and short outages do not lose indicator warm-up.
//!
//! ## Architecture Role
//!
//! ```text
//! OHLC API → [Bar Fetch] → [Bar Cache] → [Indicators] → [Trend + Entries]
//!                                                             ↓
//!           Webhook ← [Dispatch + Dedup] ← [Multi-Timeframe Agreement]
//! ```
//!
//! Each cycle fetches bars per timeframe, merges them into the CSV cache,
//! computes the indicator frame (zero-lag EMA, ATR volatility band, RSI),
//! classifies the trend with crossover hysteresis, detects center-line
//! entries, and combines the timeframes under the configured agreement
//! policy. A non-none decision becomes a signal event with a deterministic
//! id; the dispatcher suppresses duplicates inside a TTL and retries
//! delivery with exponential backoff.
//!
//! ## Determinism
//!
//! Evaluation is a pure function of the bar series and the indicator
//! parameters. Re-running a cycle over the same bars yields the same trend
//! states, the same entries, and the same signal id, which is what makes
//! the dedup layer sufficient for exactly-once delivery per logical event.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod indicators;
pub mod market;
pub mod notify;
pub mod signals;
pub mod trend;

pub use aggregate::{AgreementPolicy, Decision};
pub use cache::BarCache;
pub use config::EngineConfig;
pub use dedup::DedupStore;
pub use dispatch::{signal_id, DispatchOutcome, Dispatcher};
pub use engine::{CycleOutcome, Engine};
pub use error::{EngineError, Result};
pub use fetch::{BarSource, HttpBarSource};
pub use indicators::IndicatorFrame;
pub use notify::{Notifier, WebhookNotifier};
pub use signals::SignalSnapshot;
pub use trend::Bar0Policy;

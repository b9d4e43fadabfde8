//! Evaluation pipeline and runner loop
//!
//! ## Purpose
//!
//! One evaluation cycle runs the whole chain: fetch bars per timeframe
//! (cache-through when enabled), compute indicator snapshots, aggregate the
//! timeframes into a directional decision, and dispatch a confirmed signal.
//! The outer runner repeats cycles on a fixed interval and tolerates bounded
//! consecutive failures before halting.
//!
//! ## Outcome taxonomy
//!
//! - `MarketClosed` and `InsufficientHistory` are normal skips, never counted
//!   against the failure ceiling.
//! - An unreachable bar source is a hard cycle failure (`EngineError::Upstream`)
//!   the runner counts; it halts only after the configured consecutive ceiling.

use crate::aggregate::Decision;
use crate::cache::BarCache;
use crate::config::EngineConfig;
use crate::dedup::DedupStore;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{EngineError, Result};
use crate::fetch::BarSource;
use crate::market;
use crate::notify::Notifier;
use crate::signals::SignalSnapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trendwire_types::{SignalEvent, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The pipeline ran to completion; `dispatch` is set when a direction fired.
    Completed {
        decision: Decision,
        dispatch: Option<DispatchOutcome>,
    },
    /// Market-hours gate skipped the cycle.
    MarketClosed,
    /// Every timeframe was below the indicator warm-up length.
    InsufficientHistory,
}

/// One cycle's evaluated snapshots plus the aggregate decision.
pub struct Evaluation {
    pub snapshots: Vec<SignalSnapshot>,
    pub decision: Decision,
}

pub struct Engine {
    config: EngineConfig,
    source: Arc<dyn BarSource>,
    cache: Option<BarCache>,
    dispatcher: Dispatcher,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn BarSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let cache = config
            .cache
            .enabled
            .then(|| BarCache::new(&config.cache.dir, config.cache.max_rows));
        let dedup = match &config.dispatch.dedup_path {
            Some(path) => DedupStore::open(path)?,
            None => DedupStore::in_memory(),
        };
        let dispatcher = Dispatcher::new(notifier, dedup, config.dispatch.clone());
        Ok(Self {
            config,
            source,
            cache,
            dispatcher,
        })
    }

    /// Fetch and evaluate every configured timeframe, then aggregate.
    pub async fn evaluate(&self) -> Result<Evaluation> {
        let mut snapshots = Vec::with_capacity(self.config.timeframes.len());
        for &timeframe in &self.config.timeframes {
            let series = self.fetch_through_cache(timeframe).await?;
            let snapshot =
                SignalSnapshot::evaluate(timeframe, &series, &self.config.indicators);
            debug!(
                %timeframe,
                bars = series.len(),
                trend = snapshot.last_trend,
                recent_long = snapshot.has_recent_long(3),
                recent_short = snapshot.has_recent_short(3),
                "evaluated timeframe"
            );
            snapshots.push(snapshot);
        }
        let decision = self.config.agreement.decide(&snapshots);
        Ok(Evaluation {
            snapshots,
            decision,
        })
    }

    async fn fetch_through_cache(&self, timeframe: Timeframe) -> Result<trendwire_types::Series> {
        let fetched = self
            .source
            .fetch(&self.config.symbol, timeframe, self.config.fetch_limit)
            .await?
            .ok_or_else(|| EngineError::Upstream {
                message: format!(
                    "bar source unavailable for {} {}",
                    self.config.symbol, timeframe
                ),
            })?;
        match &self.cache {
            Some(cache) => cache.append(&self.config.symbol, timeframe, &fetched),
            None => Ok(fetched),
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.run_cycle_at(Utc::now()).await
    }

    pub(crate) async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        if self.config.runner.respect_market_hours && !market::is_open(now) {
            debug!("market closed, skipping cycle");
            return Ok(CycleOutcome::MarketClosed);
        }

        let evaluation = self.evaluate().await?;
        if evaluation
            .snapshots
            .iter()
            .all(|s| s.insufficient_history)
        {
            warn!("all timeframes below indicator warm-up, skipping cycle");
            return Ok(CycleOutcome::InsufficientHistory);
        }

        let dispatch = match evaluation.decision {
            Decision::None => {
                debug!("no agreement this cycle");
                None
            }
            Decision::Direction(direction) => {
                match self.build_event(&evaluation, direction) {
                    Some(event) => {
                        info!(
                            signal_type = direction.signal_type(),
                            price = event.price,
                            "confirmed {direction} signal, dispatching"
                        );
                        Some(self.dispatcher.dispatch_at(&event, now.timestamp()).await?)
                    }
                    None => {
                        warn!("agreement reached but reporting timeframe has no bars");
                        None
                    }
                }
            }
        };
        Ok(CycleOutcome::Completed {
            decision: evaluation.decision,
            dispatch,
        })
    }

    /// The signal event reports the fastest timeframe's last bar.
    fn build_event(
        &self,
        evaluation: &Evaluation,
        direction: trendwire_types::Direction,
    ) -> Option<SignalEvent> {
        let fastest = evaluation.snapshots.first()?;
        Some(SignalEvent {
            symbol: self.config.symbol.clone(),
            timeframe: fastest.timeframe,
            direction,
            price: fastest.last_close?,
            trend: fastest.last_trend,
            rsi: fastest.last_rsi,
            bar_time: fastest.last_bar_time?,
        })
    }

    /// Run cycles forever on the configured interval. Halts with an error only
    /// after the consecutive hard-failure ceiling; skips never count.
    pub async fn run(&self) -> Result<()> {
        let interval = Duration::from_secs(self.config.runner.interval_secs);
        let ceiling = self.config.runner.max_consecutive_failures;
        let mut consecutive_failures = 0u32;
        info!(
            symbol = %self.config.symbol,
            timeframes = self.config.timeframes.len(),
            interval_secs = interval.as_secs(),
            "signal engine running"
        );
        loop {
            match self.run_cycle().await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    match outcome {
                        CycleOutcome::Completed { decision, dispatch } => {
                            debug!(%decision, ?dispatch, "cycle completed");
                        }
                        CycleOutcome::MarketClosed | CycleOutcome::InsufficientHistory => {}
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!(
                        consecutive_failures,
                        ceiling, "cycle failed: {e}"
                    );
                    if consecutive_failures >= ceiling {
                        return Err(EngineError::Upstream {
                            message: format!(
                                "halting after {consecutive_failures} consecutive failed cycles (last: {e})"
                            ),
                        });
                    }
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One diagnostic pass: evaluate, log per-timeframe tails, and dispatch
    /// only when `send` is set. Ignores the market-hours gate.
    pub async fn run_once(&self, send: bool) -> Result<CycleOutcome> {
        let evaluation = self.evaluate().await?;
        for snapshot in &evaluation.snapshots {
            log_tail(snapshot);
        }
        info!(decision = %evaluation.decision, "one-shot evaluation complete");
        if !send {
            return Ok(CycleOutcome::Completed {
                decision: evaluation.decision,
                dispatch: None,
            });
        }
        let dispatch = match evaluation.decision {
            Decision::Direction(direction) => match self.build_event(&evaluation, direction) {
                Some(event) => Some(self.dispatcher.dispatch(&event).await?),
                None => None,
            },
            Decision::None => None,
        };
        Ok(CycleOutcome::Completed {
            decision: evaluation.decision,
            dispatch,
        })
    }
}

/// Last few bars of one snapshot, for the one-shot diagnostic mode.
fn log_tail(snapshot: &SignalSnapshot) {
    let len = snapshot.trend.len();
    let tail = len.saturating_sub(5);
    info!("--- {} (last {} bars) ---", snapshot.timeframe, len - tail);
    for i in tail..len {
        info!(
            "idx {:>4} | zlema {:>10} | trend {:>2} | long {} | short {}",
            i,
            snapshot.zlema[i]
                .map(|z| format!("{z:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            snapshot.trend[i],
            snapshot.entries.long[i],
            snapshot.entries.short[i],
        );
    }
}

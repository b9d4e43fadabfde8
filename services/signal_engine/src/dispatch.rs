//! Signal dispatch: identity, dedup, bounded retry
//!
//! ## Purpose
//!
//! Turns a confirmed signal event into at most one delivered notification per
//! logical event. Every event derives a deterministic id; the dedup store
//! suppresses re-dispatch of the same id inside the TTL, and delivery retries
//! a bounded number of times with exponential backoff. A dry-run records the
//! dedup entry exactly like a real delivery, so switching dry-run off cannot
//! replay signals the operator already saw.
//!
//! ## Outcomes
//!
//! `DuplicateSuppressed` and `Failed` are distinct, observable results: the
//! first is normal operation, the second means every attempt was exhausted.

use crate::config::DispatchConfig;
use crate::dedup::DedupStore;
use crate::error::Result;
use crate::notify::Notifier;
use chrono::Utc;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use trendwire_types::SignalEvent;

/// Deterministic signal id: Keccak-256 over the event identity string
/// (symbol, timeframe, signal type, bar timestamp), hex-encoded and truncated.
/// The same logical event always yields the same id.
pub fn signal_id(event: &SignalEvent) -> String {
    let digest = Keccak256::digest(event.identity().as_bytes());
    hex::encode(&digest[..16])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted by the notifier.
    Delivered,
    /// Dry-run mode: logged and recorded, nothing sent.
    DryRun,
    /// A record younger than the TTL suppressed the attempt.
    DuplicateSuppressed,
    /// All delivery attempts exhausted.
    Failed,
}

pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    dedup: DedupStore,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, dedup: DedupStore, config: DispatchConfig) -> Self {
        Self {
            notifier,
            dedup,
            config,
        }
    }

    pub async fn dispatch(&self, event: &SignalEvent) -> Result<DispatchOutcome> {
        self.dispatch_at(event, Utc::now().timestamp()).await
    }

    /// Dispatch with an explicit clock, so TTL behavior is testable.
    pub(crate) async fn dispatch_at(
        &self,
        event: &SignalEvent,
        now: i64,
    ) -> Result<DispatchOutcome> {
        let id = signal_id(event);

        // Lazy eviction: expired records go on every attempt, no timer.
        let purged = self.dedup.purge_older_than(now - self.config.dedup_ttl_secs)?;
        if purged > 0 {
            debug!(purged, "evicted expired dedup records");
        }

        if let Some(sent_at) = self.dedup.get(&id) {
            if now - sent_at < self.config.dedup_ttl_secs {
                info!(
                    signal_id = %id,
                    signal_type = event.direction.signal_type(),
                    age_secs = now - sent_at,
                    "duplicate signal suppressed"
                );
                return Ok(DispatchOutcome::DuplicateSuppressed);
            }
        }

        if self.config.dry_run {
            info!(
                signal_id = %id,
                signal_type = event.direction.signal_type(),
                price = event.price,
                "[dry-run] would send signal"
            );
            self.dedup.set(&id, now)?;
            return Ok(DispatchOutcome::DryRun);
        }

        let payload = event.payload(&id);
        for attempt in 1..=self.config.attempts {
            if self.notifier.send(&payload, &id).await {
                self.dedup.set(&id, now)?;
                info!(
                    signal_id = %id,
                    signal_type = event.direction.signal_type(),
                    attempt,
                    "signal delivered"
                );
                return Ok(DispatchOutcome::Delivered);
            }
            if attempt < self.config.attempts {
                let wait = self.config.backoff_base_secs.saturating_pow(attempt);
                warn!(signal_id = %id, attempt, wait_secs = wait, "delivery attempt failed, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
            }
        }
        warn!(
            signal_id = %id,
            signal_type = event.direction.signal_type(),
            attempts = self.config.attempts,
            "signal delivery failed, attempts exhausted"
        );
        Ok(DispatchOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trendwire_types::{Direction, SignalPayload, Timeframe};

    /// Notifier returning a scripted sequence of results (then `true`).
    struct ScriptedNotifier {
        script: Mutex<Vec<bool>>,
        calls: AtomicUsize,
    }

    impl ScriptedNotifier {
        fn new(script: Vec<bool>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn send(&self, _payload: &SignalPayload, _token: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            if script.is_empty() {
                true
            } else {
                script.remove(0)
            }
        }
    }

    fn event(direction: Direction) -> SignalEvent {
        SignalEvent {
            symbol: "XAU/USD".to_string(),
            timeframe: Timeframe::M5,
            direction,
            price: 1925.5,
            trend: direction.trend_sign(),
            rsi: Some(61.0),
            bar_time: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn dispatcher(notifier: Arc<ScriptedNotifier>, dry_run: bool) -> Dispatcher {
        let config = DispatchConfig {
            webhook_url: "https://example.com/webhook".to_string(),
            dry_run,
            ..DispatchConfig::default()
        };
        Dispatcher::new(notifier, DedupStore::in_memory(), config)
    }

    #[test]
    fn signal_id_is_deterministic_per_logical_event() {
        let long = event(Direction::Long);
        assert_eq!(signal_id(&long), signal_id(&long));
        assert_ne!(signal_id(&long), signal_id(&event(Direction::Short)));
        let mut other_bar = event(Direction::Long);
        other_bar.bar_time = chrono::Utc.timestamp_opt(1_700_000_300, 0).unwrap();
        assert_ne!(signal_id(&long), signal_id(&other_bar));
    }

    #[tokio::test]
    async fn duplicate_within_ttl_is_suppressed() {
        let notifier = ScriptedNotifier::new(vec![]);
        let dispatcher = dispatcher(notifier.clone(), false);
        let event = event(Direction::Long);

        let first = dispatcher.dispatch_at(&event, 1000).await.unwrap();
        let second = dispatcher.dispatch_at(&event, 1060).await.unwrap();

        assert_eq!(first, DispatchOutcome::Delivered);
        assert_eq!(second, DispatchOutcome::DuplicateSuppressed);
        assert_eq!(notifier.calls(), 1);
    }

    #[tokio::test]
    async fn expired_ttl_allows_redispatch() {
        let notifier = ScriptedNotifier::new(vec![]);
        let dispatcher = dispatcher(notifier.clone(), false);
        let event = event(Direction::Short);

        assert_eq!(
            dispatcher.dispatch_at(&event, 1000).await.unwrap(),
            DispatchOutcome::Delivered
        );
        // Default TTL is 120 s; 200 s later the record has expired.
        assert_eq!(
            dispatcher.dispatch_at(&event, 1200).await.unwrap(),
            DispatchOutcome::Delivered
        );
        assert_eq!(notifier.calls(), 2);
    }

    #[tokio::test]
    async fn dry_run_counts_as_sent_for_suppression() {
        let notifier = ScriptedNotifier::new(vec![]);
        let dispatcher = dispatcher(notifier.clone(), true);
        let event = event(Direction::Long);

        assert_eq!(
            dispatcher.dispatch_at(&event, 1000).await.unwrap(),
            DispatchOutcome::DryRun
        );
        assert_eq!(
            dispatcher.dispatch_at(&event, 1010).await.unwrap(),
            DispatchOutcome::DuplicateSuppressed
        );
        assert_eq!(notifier.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_report_failure() {
        let notifier = ScriptedNotifier::new(vec![false, false, false]);
        let dispatcher = dispatcher(notifier.clone(), false);

        let outcome = dispatcher
            .dispatch_at(&event(Direction::Long), 1000)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(notifier.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_to_success() {
        let notifier = ScriptedNotifier::new(vec![false, true]);
        let dispatcher = dispatcher(notifier.clone(), false);
        let event = event(Direction::Long);

        let outcome = dispatcher.dispatch_at(&event, 1000).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(notifier.calls(), 2);

        // Failure did not poison the dedup store; the success did record it.
        assert_eq!(
            dispatcher.dispatch_at(&event, 1010).await.unwrap(),
            DispatchOutcome::DuplicateSuppressed
        );
    }

    #[tokio::test]
    async fn failure_does_not_record_dedup_entry() {
        let notifier = ScriptedNotifier::new(vec![false]);
        let mut config = DispatchConfig {
            webhook_url: "https://example.com/webhook".to_string(),
            ..DispatchConfig::default()
        };
        config.attempts = 1;
        let dispatcher = Dispatcher::new(notifier.clone(), DedupStore::in_memory(), config);
        let event = event(Direction::Long);

        assert_eq!(
            dispatcher.dispatch_at(&event, 1000).await.unwrap(),
            DispatchOutcome::Failed
        );
        // Next cycle may try again immediately.
        assert_eq!(
            dispatcher.dispatch_at(&event, 1010).await.unwrap(),
            DispatchOutcome::Delivered
        );
    }
}

//! Notification delivery
//!
//! [`Notifier`] is the delivery seam: one attempt, boolean success. Retry and
//! dedup policy live in the dispatcher. The webhook implementation POSTs the
//! JSON payload with the signal id as an `Idempotency-Key` header so the
//! receiving system can deduplicate repeated deliveries on its side.

use crate::config::DispatchConfig;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use trendwire_types::SignalPayload;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// One delivery attempt. `false` covers both transport failures and
    /// non-2xx responses; the dispatcher decides whether to retry.
    async fn send(&self, payload: &SignalPayload, idempotency_token: &str) -> bool;
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &SignalPayload, idempotency_token: &str) -> bool {
        match self
            .client
            .post(&self.url)
            .header(IDEMPOTENCY_HEADER, idempotency_token)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!(%status, signal_id = idempotency_token, "webhook accepted signal");
                    true
                } else {
                    warn!(%status, signal_id = idempotency_token, "webhook rejected signal");
                    false
                }
            }
            Err(e) => {
                warn!(signal_id = idempotency_token, "webhook request failed: {e}");
                false
            }
        }
    }
}

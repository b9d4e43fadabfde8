//! Bar source: upstream OHLC fetch
//!
//! [`BarSource`] is the seam between the engine and the price feed. The HTTP
//! implementation targets a Twelve Data style time-series endpoint; fetches
//! use a bounded request timeout and a bounded number of attempts, and an
//! unreachable upstream is a well-defined `Ok(None)`; the orchestration
//! layer, not this module, decides what an unavailable source means for the
//! cycle. The API key is resolved from the environment at construction and a
//! missing key fails fast before any request is made.

use crate::cache;
use crate::config::SourceConfig;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use trendwire_types::{Bar, Series, Timeframe};

#[async_trait]
pub trait BarSource: Send + Sync {
    /// Fetch up to `count` bars, oldest first. `Ok(None)` means the upstream
    /// could not be reached within the bounded attempts, a legitimate and
    /// expected outcome, not an error.
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Series>>;
}

#[derive(Debug)]
pub struct HttpBarSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    attempts: u32,
}

impl HttpBarSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EngineError::Configuration {
                message: format!(
                    "no API key: set the {} environment variable",
                    config.api_key_env
                ),
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            attempts: config.attempts,
        })
    }

    async fn fetch_once(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> std::result::Result<Series, String> {
        let url = format!("{}/time_series", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", &timeframe.interval()),
                ("outputsize", &count.to_string()),
                ("order", "ASC"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("upstream responded with status {status}"));
        }
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {e}"))?;
        parse_time_series(&body)
    }
}

#[async_trait]
impl BarSource for HttpBarSource {
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Option<Series>> {
        for attempt in 1..=self.attempts {
            match self.fetch_once(symbol, timeframe, count).await {
                Ok(series) => {
                    debug!(symbol, %timeframe, bars = series.len(), "fetched OHLC bars");
                    return Ok(Some(series));
                }
                Err(reason) => {
                    warn!(symbol, %timeframe, attempt, "bar fetch failed: {reason}");
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }
        }
        warn!(
            symbol, %timeframe,
            "bar source unavailable after {} attempts", self.attempts
        );
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    values: Vec<RawBar>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// One bar as the API serializes it; numeric fields arrive as strings from
/// some providers and as numbers from others.
#[derive(Debug, Deserialize)]
struct RawBar {
    datetime: String,
    open: serde_json::Value,
    high: serde_json::Value,
    low: serde_json::Value,
    close: serde_json::Value,
    #[serde(default)]
    volume: Option<serde_json::Value>,
}

fn parse_time_series(body: &str) -> std::result::Result<Series, String> {
    let response: TimeSeriesResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response: {e}"))?;
    if response.status.as_deref() == Some("error") {
        return Err(format!(
            "upstream error: {}",
            response.message.unwrap_or_else(|| "no message".to_string())
        ));
    }
    let mut bars = Vec::with_capacity(response.values.len());
    for raw in &response.values {
        bars.push(parse_raw_bar(raw)?);
    }
    Ok(Series::normalized(bars))
}

fn parse_raw_bar(raw: &RawBar) -> std::result::Result<Bar, String> {
    let timestamp = cache::parse_datetime(&raw.datetime)
        .ok_or_else(|| format!("unparseable datetime '{}'", raw.datetime))?;
    let field = |value: &serde_json::Value, name: &str| {
        value_to_f64(value).ok_or_else(|| format!("unparseable {name} '{value}'"))
    };
    let volume = raw
        .volume
        .as_ref()
        .and_then(value_to_f64)
        .map(|v| v as u64)
        .unwrap_or(1);
    Ok(Bar::new(
        timestamp,
        field(&raw.open, "open")?,
        field(&raw.high, "high")?,
        field(&raw.low, "low")?,
        field(&raw.close, "close")?,
    )
    .with_volume(volume))
}

fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_valued_bars_ascending() {
        let body = r#"{
            "values": [
                {"datetime": "2024-01-02 10:00:00", "open": "2050.1", "high": "2051.0",
                 "low": "2049.5", "close": "2050.8", "volume": "3"},
                {"datetime": "2024-01-02 10:05:00", "open": 2050.8, "high": 2052.0,
                 "low": 2050.0, "close": 2051.5}
            ],
            "status": "ok"
        }"#;
        let series = parse_time_series(body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].volume, 3);
        assert_eq!(series.bars()[1].volume, 1); // defaulted
        assert_eq!(series.bars()[1].close, 2051.5);
        assert!(series.bars()[0].timestamp < series.bars()[1].timestamp);
    }

    #[test]
    fn upstream_error_status_is_reported() {
        let body = r#"{"status": "error", "message": "symbol not found"}"#;
        let err = parse_time_series(body).unwrap_err();
        assert!(err.contains("symbol not found"));
    }

    #[test]
    fn out_of_order_values_are_normalized() {
        let body = r#"{
            "values": [
                {"datetime": "2024-01-02 10:05:00", "open": 2, "high": 2, "low": 2, "close": 2},
                {"datetime": "2024-01-02 10:00:00", "open": 1, "high": 1, "low": 1, "close": 1}
            ]
        }"#;
        let series = parse_time_series(body).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let config = SourceConfig {
            api_key_env: "TRENDWIRE_TEST_NO_SUCH_KEY".to_string(),
            ..SourceConfig::default()
        };
        let err = HttpBarSource::from_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
    }
}

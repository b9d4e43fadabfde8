//! Engine configuration
//!
//! ## Purpose
//!
//! Single configuration surface for every axis the pipeline variants used to
//! hard-code: timeframe set, agreement policy, cache on/off, dry-run dispatch.
//! Loaded from a TOML file with environment overrides for deploy-time values;
//! every section has production defaults and is validated before the engine
//! starts. Secrets (the OHLC API key) are never stored in the file; the config
//! carries the *name* of the environment variable to read.

use crate::aggregate::AgreementPolicy;
use crate::error::{EngineError, Result};
use crate::trend::Bar0Policy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use trendwire_types::Timeframe;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Instrument symbol in the upstream API's notation.
    pub symbol: String,

    /// Timeframes to evaluate, fastest first. The first entry is the reporting
    /// timeframe for dispatched signals; the last is the HTF for confirmation.
    pub timeframes: Vec<Timeframe>,

    /// Bars requested per timeframe each cycle.
    pub fetch_limit: usize,

    pub indicators: IndicatorConfig,
    pub agreement: AgreementPolicy,
    pub cache: CacheConfig,
    pub source: SourceConfig,
    pub dispatch: DispatchConfig,
    pub runner: RunnerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "XAU/USD".to_string(),
            timeframes: vec![Timeframe::M5, Timeframe::M15, Timeframe::H1],
            fetch_limit: 300,
            indicators: IndicatorConfig::default(),
            agreement: AgreementPolicy::default(),
            cache: CacheConfig::default(),
            source: SourceConfig::default(),
            dispatch: DispatchConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Indicator parameters shared by every timeframe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_length: usize,
    pub rsi_length: usize,
    pub band_mult: f64,
    pub bar0_policy: Bar0Policy,
}

impl IndicatorConfig {
    /// Minimum bars required before indicator output is meaningful.
    pub fn min_history(&self) -> usize {
        self.ema_length * 3
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_length: 70,
            rsi_length: 14,
            band_mult: 1.2,
            bar0_policy: Bar0Policy::AlwaysNeutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Maximum rows retained per (symbol, interval) file.
    pub max_rows: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("data/bar_cache"),
            max_rows: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Fetch attempts per cycle before reporting the source unavailable.
    pub attempts: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key_env: "TWELVE_DATA_API_KEY".to_string(),
            timeout_secs: 10,
            attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub webhook_url: String,
    /// Seconds a dedup record suppresses re-dispatch of the same signal id.
    pub dedup_ttl_secs: i64,
    pub attempts: u32,
    /// Backoff between attempts grows as base^attempt seconds.
    pub backoff_base_secs: u64,
    /// Log instead of delivering; still records dedup entries.
    pub dry_run: bool,
    /// Durable dedup store file. `None` keeps dedup in memory only.
    pub dedup_path: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            dedup_ttl_secs: 120,
            attempts: 3,
            backoff_base_secs: 2,
            dry_run: false,
            dedup_path: Some(PathBuf::from("data/dedup.json")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub interval_secs: u64,
    /// Consecutive hard-failure ceiling before the runner halts.
    pub max_consecutive_failures: u32,
    /// Skip evaluation cycles while the market is closed.
    pub respect_market_hours: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_consecutive_failures: 5,
            respect_market_hours: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file is absent, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let parsed: EngineConfig =
                    toml::from_str(&content).map_err(|e| EngineError::Configuration {
                        message: format!("failed to parse {}: {e}", p.display()),
                    })?;
                info!("Loaded configuration from {}", p.display());
                parsed
            }
            Some(p) => {
                info!("Config file {} not found, using defaults", p.display());
                EngineConfig::default()
            }
            None => EngineConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Deploy-time overrides, matching the env vars the original bot honored.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("WEBHOOK_URL") {
            if !url.is_empty() {
                self.dispatch.webhook_url = url;
            }
        }
        if let Ok(symbol) = std::env::var("SYMBOL") {
            if !symbol.is_empty() {
                self.symbol = symbol;
            }
        }
        if let Ok(secs) = std::env::var("FETCH_INTERVAL") {
            if let Ok(secs) = secs.parse() {
                self.runner.interval_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeframes.is_empty() {
            return Err(self.invalid("timeframes must not be empty"));
        }
        if self.indicators.ema_length < 2 {
            return Err(self.invalid("indicators.ema_length must be at least 2"));
        }
        if self.indicators.rsi_length < 2 {
            return Err(self.invalid("indicators.rsi_length must be at least 2"));
        }
        if !(self.indicators.band_mult > 0.0) {
            return Err(self.invalid("indicators.band_mult must be positive"));
        }
        if self.fetch_limit < self.indicators.min_history() {
            return Err(self.invalid(
                "fetch_limit is below ema_length*3; indicators would never warm up",
            ));
        }
        if self.dispatch.attempts == 0 || self.source.attempts == 0 {
            return Err(self.invalid("attempts must be at least 1"));
        }
        if self.dispatch.dedup_ttl_secs <= 0 {
            return Err(self.invalid("dispatch.dedup_ttl_secs must be positive"));
        }
        if !self.dispatch.dry_run && self.dispatch.webhook_url.is_empty() {
            return Err(self.invalid(
                "dispatch.webhook_url is required (set it in the config file or WEBHOOK_URL)",
            ));
        }
        self.agreement.validate(self.timeframes.len()).map_err(|message| {
            EngineError::Configuration { message }
        })?;
        Ok(())
    }

    fn invalid(&self, message: &str) -> EngineError {
        EngineError::Configuration {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_in_dry_run() {
        let mut config = EngineConfig::default();
        config.dispatch.dry_run = true;
        config.validate().unwrap();
    }

    #[test]
    fn missing_webhook_fails_fast() {
        let config = EngineConfig::default();
        assert!(config.dispatch.webhook_url.is_empty());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("webhook_url"));
    }

    #[test]
    fn short_fetch_limit_is_rejected() {
        let mut config = EngineConfig::default();
        config.dispatch.dry_run = true;
        config.fetch_limit = 100; // below 70*3
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: EngineConfig = toml::from_str(
            r#"
            symbol = "EUR/USD"
            timeframes = ["5min", "1h"]

            [dispatch]
            webhook_url = "https://example.com/webhook"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.symbol, "EUR/USD");
        assert_eq!(parsed.timeframes, vec![Timeframe::M5, Timeframe::H1]);
        assert_eq!(parsed.indicators.ema_length, 70);
        parsed.validate().unwrap();
    }
}

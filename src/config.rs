use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::mtf_analysis::DEFAULT_WINDOW_LIMIT;
use crate::policy::DEFAULT_MIN_CONFIDENCE;
use crate::tracker::TrackerConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Seconds between full scans. Zero runs a single pass.
    #[serde(default)]
    pub scan_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            min_confidence: default_min_confidence(),
            scan_interval_secs: 0,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,
    #[serde(default = "default_btc_symbol")]
    pub btc_symbol: String,
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframes: default_timeframes(),
            btc_symbol: default_btc_symbol(),
            window_limit: default_window_limit(),
        }
    }
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_timeframes() -> Vec<String> {
    ["15m", "1h", "4h", "1d"].iter().map(|s| s.to_string()).collect()
}

fn default_btc_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_window_limit() -> usize {
    DEFAULT_WINDOW_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_horizon")]
    pub horizon_hours: u64,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            horizon_hours: default_horizon(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_horizon() -> u64 {
    24
}

fn default_retry_backoff() -> u64 {
    10
}

impl TrackerSettings {
    pub fn to_tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            horizon: Duration::from_secs(self.horizon_hours * 60 * 60),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { path: default_journal_path() }
    }
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("logs/signals_log.csv")
}

impl Settings {
    /// Loads `<name>.toml` (optional) with `SIGNAL__SECTION__KEY` overrides.
    pub fn load(name: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("SIGNAL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("trading.symbols")
                    .with_list_parse_key("trading.timeframes"),
            )
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let settings: Settings = settings
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trading.symbols.is_empty() {
            return Err(EngineError::Config("trading.symbols must not be empty".to_string()));
        }
        if self.trading.timeframes.is_empty() {
            return Err(EngineError::Config("trading.timeframes must not be empty".to_string()));
        }
        if !(0.0..=100.0).contains(&self.app.min_confidence) {
            return Err(EngineError::Config(format!(
                "app.min_confidence must be within 0-100, got {}",
                self.app.min_confidence
            )));
        }
        if self.tracker.poll_interval_secs == 0 {
            return Err(EngineError::Config("tracker.poll_interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}

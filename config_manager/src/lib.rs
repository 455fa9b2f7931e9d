use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Prefix for environment overrides, e.g. `SOLTRACKER__ANALYSIS__DUST_THRESHOLD`
pub const ENV_PREFIX: &str = "SOLTRACKER";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    /// Analysis thresholds and fetch limits
    pub analysis: AnalysisConfig,

    /// Offline data sources and report output
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Post-buy high must exceed avg buy price by this factor to flag a roundtrip
    pub roundtrip_multiplier: f64,

    /// Token balance at or below which a position counts as closed
    pub dust_threshold: f64,

    /// Maximum swaps fetched per wallet
    pub swap_fetch_limit: usize,

    /// Hourly candles fetched per wallet position (one week by default)
    pub position_candle_limit: usize,

    /// Hourly candles fetched per manual trade
    pub manual_candle_limit: usize,

    /// Positions priced concurrently (1 = sequential)
    pub price_concurrency: usize,

    /// Trades listed per position in reports
    pub recent_trades: usize,

    /// Report ordering: "pnl", "missed" or "invested"
    pub sort_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotConfig {
    /// JSON array of enhanced swap transactions
    pub swaps_path: String,

    /// JSON object of token price snapshots keyed by mint
    pub prices_path: String,

    /// Directory holding one `<pair_address>.json` OHLCV dump per pool
    pub candles_dir: String,

    /// JSON array of manually logged trades
    pub manual_trades_path: String,

    /// Write a per-position CSV here when set
    pub report_csv_path: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            roundtrip_multiplier: 1.5,
            dust_threshold: 0.001,
            swap_fetch_limit: 100,
            position_candle_limit: 168,
            manual_candle_limit: 1000,
            price_concurrency: 1,
            recent_trades: 5,
            sort_by: "pnl".to_string(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            swaps_path: "data/swaps.json".to_string(),
            prices_path: "data/prices.json".to_string(),
            candles_dir: "data/candles".to_string(),
            manual_trades_path: "data/manual_trades.json".to_string(),
            report_csv_path: None,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate analysis thresholds and limits
    pub fn validate(&self) -> Result<()> {
        if !self.roundtrip_multiplier.is_finite() || self.roundtrip_multiplier <= 0.0 {
            return Err(ConfigurationError::InvalidValue(format!(
                "roundtrip_multiplier must be positive, got {}",
                self.roundtrip_multiplier
            )));
        }

        if !self.dust_threshold.is_finite() || self.dust_threshold < 0.0 {
            return Err(ConfigurationError::InvalidValue(format!(
                "dust_threshold cannot be negative, got {}",
                self.dust_threshold
            )));
        }

        for (name, value) in [
            ("swap_fetch_limit", self.swap_fetch_limit),
            ("position_candle_limit", self.position_candle_limit),
            ("manual_candle_limit", self.manual_candle_limit),
            ("price_concurrency", self.price_concurrency),
        ] {
            if value == 0 {
                return Err(ConfigurationError::InvalidValue(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if !matches!(
            self.sort_by.trim().to_lowercase().as_str(),
            "pnl" | "missed" | "invested"
        ) {
            return Err(ConfigurationError::InvalidValue(format!(
                "sort_by must be one of pnl, missed, invested; got '{}'",
                self.sort_by
            )));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );

        let system_config: SystemConfig = config_builder.build()?.try_deserialize()?;

        system_config.validate()?;

        Ok(system_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;

        if self.snapshot.swaps_path.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "snapshot.swaps_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

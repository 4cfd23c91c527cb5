//! TOML configuration
//!
//! One document with a section per subsystem. Every field has a default
//! so a missing file or a sparse one still yields a runnable paper
//! setup; validation rejects configurations that could only lose money
//! to bugs (non-positive capital, inverted thresholds).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domain::{GridConfig, RiskConfig};
use crate::strategy::{SignalConfig, TrendConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    pub initial_capital_usdc: f64,
    pub state_file: String,
    pub alerts_file: String,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        Self {
            initial_capital_usdc: 100.0,
            state_file: "data/state.json".to_string(),
            alerts_file: "data/alerts.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub min_signal_score: f64,
    pub spike_multiplier: f64,
    /// Discovery search terms sent to the market data source
    pub search_queries: Vec<String>,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            min_signal_score: 35.0,
            spike_multiplier: 3.0,
            search_queries: vec!["solana".to_string(), "raydium".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSection {
    pub reference_mint: String,
    pub ttl_secs: u64,
    pub deviation_threshold_pct: f64,
}

impl Default for TrendSection {
    fn default() -> Self {
        let base = TrendConfig::default();
        Self {
            reference_mint: base.reference_mint,
            ttl_secs: base.ttl.as_secs(),
            deviation_threshold_pct: base.deviation_threshold_pct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortsSection {
    pub enabled: bool,
    pub leverage: f64,
    /// Appended to the token symbol to form the perp market id
    pub market_suffix: String,
}

impl Default for ShortsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            leverage: 2.0,
            market_suffix: "-PERP".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub scan_interval_secs: u64,
    pub review_interval_secs: u64,
    pub grid_interval_secs: u64,
    /// Pause between consecutive executions within one cycle
    pub inter_trade_delay_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            scan_interval_secs: 300,
            review_interval_secs: 60,
            grid_interval_secs: 120,
            inter_trade_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub slippage_bps: f64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self { slippage_bps: 50.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portfolio: PortfolioSection,
    pub strategy: StrategySection,
    pub risk: RiskConfig,
    pub grid: GridConfig,
    pub trend: TrendSection,
    pub shorts: ShortsSection,
    pub scheduler: SchedulerSection,
    pub execution: ExecutionSection,
    pub logging: LoggingSection,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portfolio.initial_capital_usdc <= 0.0 {
            return Err(ConfigError::Validation(
                "portfolio.initial_capital_usdc must be positive".into(),
            ));
        }
        if self.risk.max_positions == 0 {
            return Err(ConfigError::Validation(
                "risk.max_positions must be at least 1".into(),
            ));
        }
        if self.risk.max_position_size_usdc <= 0.0 {
            return Err(ConfigError::Validation(
                "risk.max_position_size_usdc must be positive".into(),
            ));
        }
        if self.risk.stop_loss_pct >= 0.0 {
            return Err(ConfigError::Validation(
                "risk.stop_loss_pct must be negative".into(),
            ));
        }
        if self.risk.take_profit_pct <= 0.0 {
            return Err(ConfigError::Validation(
                "risk.take_profit_pct must be positive".into(),
            ));
        }
        if self.risk.kill_switch_threshold_pct >= 0.0 {
            return Err(ConfigError::Validation(
                "risk.kill_switch_threshold_pct must be negative".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.strategy.min_signal_score) {
            return Err(ConfigError::Validation(
                "strategy.min_signal_score must be within 0..100".into(),
            ));
        }
        if self.grid.level_count == 0 || self.grid.spread_pct <= 0.0 {
            return Err(ConfigError::Validation(
                "grid.level_count and grid.spread_pct must be positive".into(),
            ));
        }
        if self.grid.capital_per_level <= 0.0
            || self.grid.max_grid_capital < self.grid.capital_per_level
        {
            return Err(ConfigError::Validation(
                "grid capital settings are inconsistent".into(),
            ));
        }
        if self.shorts.enabled && self.shorts.leverage < 1.0 {
            return Err(ConfigError::Validation(
                "shorts.leverage must be at least 1".into(),
            ));
        }
        if self.scheduler.scan_interval_secs == 0
            || self.scheduler.review_interval_secs == 0
            || self.scheduler.grid_interval_secs == 0
        {
            return Err(ConfigError::Validation(
                "scheduler intervals must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            min_score: self.strategy.min_signal_score,
            spike_multiplier: self.strategy.spike_multiplier,
        }
    }

    pub fn trend_config(&self) -> TrendConfig {
        TrendConfig {
            reference_mint: self.trend.reference_mint.clone(),
            ttl: Duration::from_secs(self.trend.ttl_secs),
            deviation_threshold_pct: self.trend.deviation_threshold_pct,
        }
    }
}

/// Load and validate the configuration. A missing file yields defaults;
/// an unreadable or invalid one is an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<Config>(&raw)?
    } else {
        info!("no config at {}, using defaults", path.display());
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.portfolio.initial_capital_usdc, 100.0);
        assert_relative_eq!(config.strategy.min_signal_score, 35.0);
        assert_eq!(config.risk.max_positions, 3);
        assert!(!config.shorts.enabled);
    }

    #[test]
    fn test_sparse_document_fills_defaults() {
        let raw = r#"
            [portfolio]
            initial_capital_usdc = 250.0

            [risk]
            max_positions = 5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.portfolio.initial_capital_usdc, 250.0);
        assert_eq!(config.risk.max_positions, 5);
        // Untouched sections keep their defaults
        assert_relative_eq!(config.risk.stop_loss_pct, -15.0);
        assert_relative_eq!(config.grid.spread_pct, 2.0);
        assert_eq!(config.scheduler.review_interval_secs, 60);
    }

    #[test]
    fn test_validation_rejects_positive_stop_loss() {
        let mut config = Config::default();
        config.risk.stop_loss_pct = 15.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_capital() {
        let mut config = Config::default();
        config.portfolio.initial_capital_usdc = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inconsistent_grid() {
        let mut config = Config::default();
        config.grid.max_grid_capital = 5.0;
        config.grid.capital_per_level = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trend_config_conversion() {
        let mut config = Config::default();
        config.trend.ttl_secs = 120;
        let trend = config.trend_config();
        assert_eq!(trend.ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/riptide.toml")).unwrap();
        assert_eq!(config.risk.max_positions, 3);
    }

    #[test]
    fn test_garbage_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}

//! Risk and strategy configuration.
//!
//! Both structs are immutable once handed to a component. They can be built
//! from defaults, a JSON settings file, and environment overrides (in that order).

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for position sizing and protective levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of balance risked per trade (0.01 = 1%)
    pub risk_per_trade: Decimal,

    /// Maximum number of concurrently open positions across the account
    pub max_open_positions: usize,

    /// Place a stop loss and size positions by distance to it
    pub use_stop_loss: bool,

    /// Stop loss distance from entry as a fraction of entry price
    pub stop_loss_pct: Decimal,

    /// Place a take profit order
    pub use_take_profit: bool,

    /// Take profit distance from entry as a fraction of entry price
    pub take_profit_pct: Decimal,

    /// Move the stop loss along with favorable price moves
    pub trailing_stop: bool,

    /// Trailing stop distance from current price
    pub trailing_stop_pct: Decimal,

    /// Track balance growth between sizing calls
    pub auto_compound: bool,

    /// Share of realized profit earmarked for reinvestment (0.0 to 1.0)
    pub compound_reinvest_percent: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.01),         // 1% of balance
            max_open_positions: 3,
            use_stop_loss: true,
            stop_loss_pct: dec!(0.02),          // 2% below/above entry
            use_take_profit: true,
            take_profit_pct: dec!(0.04),        // 2:1 reward/risk
            trailing_stop: false,
            trailing_stop_pct: dec!(0.01),
            auto_compound: false,
            compound_reinvest_percent: dec!(0.5),
        }
    }
}

impl RiskConfig {
    /// Defaults overridden by environment variables (`RISK_PER_TRADE`, `USE_STOP_LOSS`, ...).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables named after them in upper case.
    pub fn apply_env(&mut self) -> Result<()> {
        env_override("RISK_PER_TRADE", &mut self.risk_per_trade)?;
        env_override("MAX_OPEN_POSITIONS", &mut self.max_open_positions)?;
        env_flag("USE_STOP_LOSS", &mut self.use_stop_loss)?;
        env_override("STOP_LOSS_PCT", &mut self.stop_loss_pct)?;
        env_flag("USE_TAKE_PROFIT", &mut self.use_take_profit)?;
        env_override("TAKE_PROFIT_PCT", &mut self.take_profit_pct)?;
        env_flag("TRAILING_STOP", &mut self.trailing_stop)?;
        env_override("TRAILING_STOP_PCT", &mut self.trailing_stop_pct)?;
        env_flag("AUTO_COMPOUND", &mut self.auto_compound)?;
        env_override("COMPOUND_REINVEST_PERCENT", &mut self.compound_reinvest_percent)?;
        Ok(())
    }
}

/// Indicator parameters for the signal strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// RSI lookback window
    pub rsi_period: usize,

    /// RSI level above which the market is overbought
    pub rsi_overbought: f64,

    /// RSI level below which the market is oversold
    pub rsi_oversold: f64,

    /// Fast EMA period
    pub fast_ema: usize,

    /// Slow EMA period
    pub slow_ema: usize,

    /// Bollinger moving average window
    pub bb_window: usize,

    /// Bollinger band width in standard deviations
    pub bb_std_dev: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            fast_ema: 9,
            slow_ema: 21,
            bb_window: 20,
            bb_std_dev: 2.0,
        }
    }
}

impl StrategyConfig {
    /// Defaults overridden by environment variables (`RSI_PERIOD`, `FAST_EMA`, ...).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        env_override("RSI_PERIOD", &mut self.rsi_period)?;
        env_override("RSI_OVERBOUGHT", &mut self.rsi_overbought)?;
        env_override("RSI_OVERSOLD", &mut self.rsi_oversold)?;
        env_override("FAST_EMA", &mut self.fast_ema)?;
        env_override("SLOW_EMA", &mut self.slow_ema)?;
        env_override("BB_WINDOW", &mut self.bb_window)?;
        env_override("BB_STD_DEV", &mut self.bb_std_dev)?;
        Ok(())
    }
}

/// Complete settings: risk and strategy sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
}

impl Settings {
    /// Parse settings from JSON; missing sections and fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings")
    }

    /// Load settings from an optional JSON file, then apply `.env` and
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self {
                risk: RiskConfig::from_env()?,
                strategy: StrategyConfig::from_env()?,
            });
        };

        dotenvy::dotenv().ok();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let mut settings = Self::from_json(&json)?;
        settings.risk.apply_env()?;
        settings.strategy.apply_env()?;
        Ok(settings)
    }
}

fn env_override<T>(name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(raw) = env::var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}={:?}: {}", name, raw, e))?;
    }
    Ok(())
}

fn env_flag(name: &str, target: &mut bool) -> Result<()> {
    if let Ok(raw) = env::var(name) {
        *target = parse_flag(&raw).ok_or_else(|| anyhow!("Invalid {}={:?}: expected a boolean", name, raw))?;
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_json(
            r#"{"risk": {"risk_per_trade": "0.02", "trailing_stop": true}, "strategy": {"rsi_period": 7}}"#,
        )
        .unwrap();

        assert_eq!(settings.risk.risk_per_trade, dec!(0.02));
        assert!(settings.risk.trailing_stop);
        assert_eq!(settings.risk.max_open_positions, 3);
        assert_eq!(settings.strategy.rsi_period, 7);
        assert_eq!(settings.strategy.slow_ema, 21);
    }

    #[test]
    fn test_empty_settings() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = env::temp_dir().join(format!("sigrisk-settings-{}.json", std::process::id()));
        fs::write(&path, r#"{"risk": {"max_open_positions": 5}}"#).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.risk.max_open_positions, 5);
        assert_eq!(settings.strategy, StrategyConfig::from_env().unwrap());
    }

    #[test]
    fn test_load_without_file_uses_env_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.risk, RiskConfig::from_env().unwrap());
        assert_eq!(settings.strategy, StrategyConfig::from_env().unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/sigrisk.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_override() {
        // Variable names unique to this test to avoid races with other tests.
        env::set_var("SIGRISK_TEST_PERIOD", "21");
        env::set_var("SIGRISK_TEST_BAD", "abc");

        let mut period = 14usize;
        env_override("SIGRISK_TEST_PERIOD", &mut period).unwrap();
        assert_eq!(period, 21);

        let mut pct = dec!(0.01);
        let err = env_override("SIGRISK_TEST_BAD", &mut pct).unwrap_err();
        assert!(err.to_string().contains("SIGRISK_TEST_BAD"));
        assert_eq!(pct, dec!(0.01));

        let mut untouched = 5usize;
        env_override("SIGRISK_TEST_MISSING", &mut untouched).unwrap();
        assert_eq!(untouched, 5);
    }
}

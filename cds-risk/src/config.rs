//! Simulation configuration.
//!
//! All tunables of the engine live here, grouped by the component that
//! consumes them. Defaults reproduce the reference strategy: 110 GBM paths
//! over a 4-year daily horizon, 2-year spreads, early exits at +35% / -50%
//! inside the last 100 steps, 0.6% trade size and a 1% per-asset cap on a
//! $100K account.
//!
//! Configurations are stored as TOML (see `config/default.toml`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PreconditionError;
use crate::forecast::ForecastParams;
use crate::risk::PositionSizerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Path generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Number of synthetic paths per asset (M).
    pub num_paths: usize,
    /// Simulated horizon in years.
    pub horizon_years: u32,
    /// Simulation steps per year (365 = calendar days).
    pub steps_per_year: usize,
    /// Trailing calendar days of history used to calibrate drift and volatility.
    pub calibration_days: i64,
    /// Short moving-average window.
    pub ma_short: usize,
    /// Long moving-average window.
    pub ma_long: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            num_paths: 110,
            horizon_years: 4,
            steps_per_year: 365,
            calibration_days: 365,
            ma_short: 50,
            ma_long: 100,
        }
    }
}

impl PathConfig {
    /// Total number of steps on each path (excluding the initial value).
    pub fn horizon_steps(&self) -> usize {
        self.horizon_years as usize * self.steps_per_year
    }
}

/// Entry, exit and pricing rules of the spread strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Spread expiration measured from entry, in years.
    pub years_to_expiration: u32,
    /// Early exits are only evaluated when remaining steps are at or below this.
    pub early_exit_window: i64,
    /// Spread return that closes a position early with a profit (0.35 = +35%).
    pub early_profit_pct: f64,
    /// Spread return that closes a position early with a loss (-0.5 = -50%).
    pub early_loss_pct: f64,
    /// Number of trailing observations fed to the volatility estimator.
    pub vol_window: usize,
    /// Annualization factor of the volatility estimator.
    pub vol_annualization: f64,
    /// Shares per option contract.
    pub contract_multiplier: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            years_to_expiration: 2,
            early_exit_window: 100,
            early_profit_pct: 0.35,
            early_loss_pct: -0.5,
            vol_window: 252,
            vol_annualization: 252.0,
            contract_multiplier: 100.0,
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Number of independent trials (N).
    pub num_trials: usize,
    /// Base seed. Unseeded runs draw from the OS.
    pub seed: Option<u64>,
    /// Run trials on a rayon pool.
    pub parallel: bool,
    /// Pool size when running in parallel. Defaults to the rayon global pool.
    pub workers: Option<usize>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            num_trials: 1,
            seed: None,
            parallel: false,
            workers: None,
        }
    }
}

impl TrialConfig {
    /// Fix the base seed, drawing one when unset, and return it.
    ///
    /// Call before building the path universe so paths and trials derive
    /// from the same reported seed.
    pub fn resolve_seed(&mut self) -> u64 {
        *self.seed.get_or_insert_with(rand::random)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub paths: PathConfig,
    pub strategy: StrategyConfig,
    pub sizing: PositionSizerConfig,
    pub trials: TrialConfig,
    pub forecast: ForecastParams,
}

impl SimulationConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Steps between entry and expiration of a new spread.
    pub fn expiration_steps(&self) -> usize {
        self.strategy.years_to_expiration as usize * self.paths.steps_per_year
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        let invalid = |msg: &str| Err(PreconditionError::InvalidParameter(msg.to_string()));

        if self.paths.num_paths == 0 {
            return invalid("paths.num_paths must be at least 1");
        }
        if self.paths.horizon_steps() == 0 {
            return invalid("paths.horizon_years and paths.steps_per_year must be positive");
        }
        if self.paths.calibration_days <= 0 {
            return invalid("paths.calibration_days must be positive");
        }
        if self.paths.ma_short == 0 || self.paths.ma_long == 0 {
            return invalid("moving-average windows must be positive");
        }
        if self.strategy.vol_window < 2 {
            return invalid("strategy.vol_window must be at least 2");
        }
        if self.strategy.vol_annualization <= 0.0 {
            return invalid("strategy.vol_annualization must be positive");
        }
        if self.strategy.early_profit_pct <= 0.0 || self.strategy.early_loss_pct >= 0.0 {
            return invalid("early profit must be positive and early loss negative");
        }
        if self.strategy.contract_multiplier <= 0.0 {
            return invalid("strategy.contract_multiplier must be positive");
        }
        if self.trials.workers == Some(0) {
            return invalid("trials.workers must be at least 1");
        }
        self.sizing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.paths.num_paths, 110);
        assert_eq!(config.paths.horizon_steps(), 1460);
        assert_eq!(config.expiration_steps(), 730);
        assert_eq!(config.strategy.early_exit_window, 100);
        assert_eq!(config.strategy.early_profit_pct, 0.35);
        assert_eq!(config.strategy.early_loss_pct, -0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = SimulationConfig::from_toml(
            r#"
            [paths]
            num_paths = 20

            [trials]
            num_trials = 50
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.num_paths, 20);
        assert_eq!(config.paths.steps_per_year, 365);
        assert_eq!(config.trials.num_trials, 50);
        assert_eq!(config.trials.seed, Some(7));
        assert_eq!(config.strategy.vol_window, 252);
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = SimulationConfig::default();
        config.trials.seed = Some(42);
        config.strategy.early_exit_window = 60;

        let raw = config.to_toml().unwrap();
        let parsed = SimulationConfig::from_toml(&raw).unwrap();
        assert_eq!(parsed.trials.seed, Some(42));
        assert_eq!(parsed.strategy.early_exit_window, 60);
    }

    #[test]
    fn test_validate_rejects_zero_paths() {
        let mut config = SimulationConfig::default();
        config.paths.num_paths = 0;
        assert!(matches!(
            config.validate(),
            Err(PreconditionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_shipped_default_toml() {
        let config = SimulationConfig::from_toml(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.paths.num_paths, 110);
        assert_eq!(config.sizing.account_size, rust_decimal::Decimal::from(100_000));
        assert_eq!(config.trials.num_trials, 1000);
        assert!(config.trials.parallel);
        assert_eq!(config.trials.seed, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_seed_is_stable() {
        let mut trials = TrialConfig::default();
        let drawn = trials.resolve_seed();
        assert_eq!(trials.seed, Some(drawn));
        assert_eq!(trials.resolve_seed(), drawn);

        let mut fixed = TrialConfig {
            seed: Some(9),
            ..TrialConfig::default()
        };
        assert_eq!(fixed.resolve_seed(), 9);
    }
}

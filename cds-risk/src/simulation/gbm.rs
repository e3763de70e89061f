//! Geometric Brownian motion path generator.
//!
//! Drift and volatility are calibrated from the trailing year of daily
//! log-returns (mean x 365, sample deviation x sqrt(365)). Each step applies
//! the exact solution
//!
//!   S <- S * exp((mu - sigma^2 / 2) dt + sigma sqrt(dt) Z),  Z ~ N(0, 1)
//!
//! starting from the last historical close. Short and long trailing moving
//! averages are derived per path.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::config::PathConfig;
use crate::data::{trailing_mean, AssetHistory};
use crate::error::PreconditionError;

/// Drift, volatility and starting price of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmCalibration {
    /// Annualized drift.
    pub mu: f64,
    /// Annualized volatility.
    pub sigma: f64,
    /// First value of every path.
    pub initial_price: f64,
}

impl GbmCalibration {
    /// Calibrate from the trailing `calibration_days` of `history`.
    ///
    /// Fails fast when the history spans less than the calibration window or
    /// has fewer than two log-returns inside it.
    pub fn from_history(
        history: &AssetHistory,
        calibration_days: i64,
        periods_per_year: f64,
    ) -> Result<Self, PreconditionError> {
        let insufficient = || PreconditionError::InsufficientHistory {
            asset: history.asset.clone(),
            available_days: history.span_days(),
            required_days: calibration_days,
        };

        let (Some(last_date), Some(initial_price)) = (history.last_date(), history.last_close())
        else {
            return Err(insufficient());
        };
        if history.span_days() < calibration_days {
            return Err(insufficient());
        }

        let returns: Vec<f64> = history
            .trailing_window(last_date, calibration_days)
            .iter()
            .filter_map(|b| b.log_return)
            .collect();
        if returns.len() < 2 {
            return Err(insufficient());
        }

        let mu = returns.iter().mean() * periods_per_year;
        let sigma = returns.iter().std_dev() * periods_per_year.sqrt();
        if !mu.is_finite() || !sigma.is_finite() {
            return Err(PreconditionError::NoReturns);
        }

        Ok(Self {
            mu,
            sigma,
            initial_price,
        })
    }
}

/// One synthetic price path with its moving averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPath {
    pub asset: String,
    /// Index in [0, num_paths).
    pub index: usize,
    /// Prices, `horizon_steps + 1` long; `prices[0]` is the last close.
    pub prices: Vec<f64>,
    /// Short trailing moving average, None until the window fills.
    pub ma_short: Vec<Option<f64>>,
    /// Long trailing moving average, None until the window fills.
    pub ma_long: Vec<Option<f64>>,
}

impl SimulatedPath {
    /// Build a path from explicit prices, deriving the moving averages.
    pub fn from_prices(
        asset: &str,
        index: usize,
        prices: Vec<f64>,
        ma_short_window: usize,
        ma_long_window: usize,
    ) -> Self {
        let ma_short = trailing_mean(&prices, ma_short_window);
        let ma_long = trailing_mean(&prices, ma_long_window);
        Self {
            asset: asset.to_string(),
            index,
            prices,
            ma_short,
            ma_long,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Number of steps after the initial value.
    pub fn horizon_steps(&self) -> usize {
        self.prices.len().saturating_sub(1)
    }
}

/// GBM path generator.
#[derive(Debug, Clone)]
pub struct PathSimulator {
    config: PathConfig,
}

impl PathSimulator {
    pub fn new(config: PathConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathConfig {
        &self.config
    }

    /// Calibrate on `history` and generate `num_paths` paths.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        history: &AssetHistory,
        rng: &mut R,
    ) -> Result<(GbmCalibration, Vec<SimulatedPath>), PreconditionError> {
        let calibration = GbmCalibration::from_history(
            history,
            self.config.calibration_days,
            self.config.steps_per_year as f64,
        )?;
        debug!(
            asset = %history.asset,
            mu = calibration.mu,
            sigma = calibration.sigma,
            s0 = calibration.initial_price,
            "Calibrated GBM"
        );
        let paths = self.simulate_with(&history.asset, &calibration, rng)?;
        Ok((calibration, paths))
    }

    /// Generate paths from an explicit calibration.
    pub fn simulate_with<R: Rng + ?Sized>(
        &self,
        asset: &str,
        calibration: &GbmCalibration,
        rng: &mut R,
    ) -> Result<Vec<SimulatedPath>, PreconditionError> {
        if !(calibration.initial_price > 0.0) {
            return Err(PreconditionError::NonPositivePrice(calibration.initial_price));
        }
        if !(calibration.sigma >= 0.0) {
            return Err(PreconditionError::NonPositiveVolatility(calibration.sigma));
        }
        let steps = self.config.horizon_steps();
        if steps == 0 {
            return Err(PreconditionError::InvalidParameter(
                "horizon must contain at least one step".to_string(),
            ));
        }

        let dt = self.config.horizon_years as f64 / steps as f64;
        let drift = (calibration.mu - 0.5 * calibration.sigma * calibration.sigma) * dt;
        let diffusion = calibration.sigma * dt.sqrt();

        let paths = (0..self.config.num_paths)
            .map(|index| {
                let mut prices = Vec::with_capacity(steps + 1);
                let mut price = calibration.initial_price;
                prices.push(price);
                for _ in 0..steps {
                    let z: f64 = rng.sample(StandardNormal);
                    price *= (drift + diffusion * z).exp();
                    prices.push(price);
                }
                SimulatedPath::from_prices(
                    asset,
                    index,
                    prices,
                    self.config.ma_short,
                    self.config.ma_long,
                )
            })
            .collect();

        Ok(paths)
    }
}

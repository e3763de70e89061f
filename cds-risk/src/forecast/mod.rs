//! Forecast collaborator boundary.
//!
//! The engine consumes a one-step-ahead forecast of a price series as an
//! opaque function returning a point estimate and a strictly ordered
//! confidence interval. Only the interval drives strike selection.
//!
//! `RandomWalkForecaster` is a self-contained stand-in (random walk with
//! drift). Autoregressive model fitting is left to external implementations
//! of `Forecaster`.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::error::PreconditionError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid forecast: {0}")]
    Invalid(#[from] PreconditionError),

    #[error("Model failure: {0}")]
    Model(String),
}

/// Model parameters handed to the forecaster untouched by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    /// Non-seasonal (p, d, q) order.
    pub order: [usize; 3],
    /// Seasonal (P, D, Q, s) order.
    pub seasonal_order: [usize; 4],
    /// Two-sided confidence level of the interval.
    pub confidence: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            order: [1, 0, 1],
            seasonal_order: [0, 0, 0, 0],
            confidence: 0.95,
        }
    }
}

/// Confidence interval with `low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    low: f64,
    high: f64,
}

impl ForecastInterval {
    pub fn new(low: f64, high: f64) -> Result<Self, PreconditionError> {
        if !(low < high) || !low.is_finite() || !high.is_finite() {
            return Err(PreconditionError::InvalidInterval { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub point: f64,
    pub interval: ForecastInterval,
}

/// One-step-ahead forecaster.
///
/// Implementations must be shareable across trial threads.
pub trait Forecaster: Send + Sync {
    fn forecast(&self, series: &[f64], params: &ForecastParams) -> Result<Forecast, ForecastError>;
}

impl<F> Forecaster for F
where
    F: Fn(&[f64], &ForecastParams) -> Result<Forecast, ForecastError> + Send + Sync,
{
    fn forecast(&self, series: &[f64], params: &ForecastParams) -> Result<Forecast, ForecastError> {
        self(series, params)
    }
}

/// Random walk with drift: point = last + mean(diff), interval = point ± z * sd(diff).
///
/// The model order in `ForecastParams` is ignored; the confidence level is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWalkForecaster;

impl RandomWalkForecaster {
    /// Minimum series length (two differences for a sample deviation).
    pub const MIN_OBSERVATIONS: usize = 3;
}

impl Forecaster for RandomWalkForecaster {
    fn forecast(&self, series: &[f64], params: &ForecastParams) -> Result<Forecast, ForecastError> {
        if series.len() < Self::MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                needed: Self::MIN_OBSERVATIONS,
                got: series.len(),
            });
        }
        if !(params.confidence > 0.0 && params.confidence < 1.0) {
            return Err(PreconditionError::InvalidParameter(format!(
                "confidence must be in (0, 1), got {}",
                params.confidence
            ))
            .into());
        }

        let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let drift = diffs.iter().mean();
        let sd = diffs.iter().std_dev();

        let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Model(e.to_string()))?;
        let z = normal.inverse_cdf(0.5 + params.confidence / 2.0);

        let last = series[series.len() - 1];
        let point = last + drift;
        let interval = ForecastInterval::new(point - z * sd, point + z * sd)?;

        Ok(Forecast { point, interval })
    }
}

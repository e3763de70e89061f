//! Realized volatility used as the pricing input.
//!
//! sigma = sqrt(annualization / n * sum(r_i^2)), r_i = ln(p_i / p_{i-1}),
//! rounded to 6 decimals. The annualization defaults to 252 trading days,
//! while path calibration and time-to-expiry use 365 steps per year.

use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

/// Realized volatility estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityEstimator {
    /// Periods per year used to annualize.
    pub annualization: f64,
}

impl Default for VolatilityEstimator {
    fn default() -> Self {
        Self {
            annualization: 252.0,
        }
    }
}

impl VolatilityEstimator {
    pub fn new(annualization: f64) -> Self {
        Self { annualization }
    }

    /// Annualized realized volatility of a price series.
    ///
    /// Fails with `NoReturns` when fewer than two prices are given and with
    /// `NonPositivePrice` when a log-return is undefined.
    pub fn estimate(&self, prices: &[f64]) -> Result<f64, PreconditionError> {
        if let Some(&bad) = prices.iter().find(|p| !(**p > 0.0) || !p.is_finite()) {
            return Err(PreconditionError::NonPositivePrice(bad));
        }

        let (sum_sq, n) = prices
            .windows(2)
            .map(|w| (w[1] / w[0]).ln())
            .fold((0.0, 0usize), |(sum, n), r| (sum + r * r, n + 1));

        if n == 0 {
            return Err(PreconditionError::NoReturns);
        }

        let sigma = (self.annualization / n as f64 * sum_sq).sqrt();
        Ok(round_to(sigma, 6))
    }
}

/// Round half-to-even at `digits` decimals.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round_ties_even() / scale
}

/// The `window` observations preceding `step` on a simulated path.
///
/// The path is treated as a continuation of `history` (the path starts at
/// the last historical close, which is not repeated). For early steps the
/// window reaches back into the historical closes.
///
/// Both edges are intentional. At step 0 the window ends before the last
/// close, and `path[0]` is never counted next to the last close it
/// duplicates (that would add a spurious zero return).
pub fn trailing_path_window(history: &[f64], path: &[f64], step: usize, window: usize) -> Vec<f64> {
    if step >= window {
        return path[step - window..step].to_vec();
    }

    // Virtual series: history ++ path[1..]; path[i] sits at history.len() - 1 + i.
    let end = (history.len() + step).saturating_sub(1);
    let start = end.saturating_sub(window);
    let mut out = Vec::with_capacity(end - start);
    for v in start..end {
        if v < history.len() {
            out.push(history[v]);
        } else {
            out.push(path[v + 1 - history.len()]);
        }
    }
    out
}

//! Entry pipeline shared by simulated trials and historical replay.
//!
//! volatility -> forecast interval -> spread selection -> sizing -> ledger

use rand::Rng;
use tracing::debug;

use crate::analytics::{EntryQuote, SelectionOutcome, SpreadSelector};
use crate::error::EngineError;
use crate::forecast::{ForecastParams, Forecaster};
use crate::portfolio::{AllocationRejected, Position, PositionLedger};
use crate::pricing::VolatilityEstimator;
use crate::risk::PositionSizer;

/// Trend-pullback trigger: short MA above long MA and price below short MA.
pub fn entry_signal(price: f64, ma_short: Option<f64>, ma_long: Option<f64>) -> bool {
    match (ma_short, ma_long) {
        (Some(short), Some(long)) => short > long && price < short,
        _ => false,
    }
}

/// Inputs of one entry attempt.
#[derive(Debug, Clone)]
pub struct EntryRequest<'a> {
    pub asset: &'a str,
    pub spot: f64,
    /// Trailing prices for volatility and forecasting.
    pub window: &'a [f64],
    pub risk_free_rate: f64,
    /// Current step (or day number).
    pub step: i64,
    /// Expiration in the same units as `step`.
    pub expiration: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Opened(Position),
    NoEligibleCandidate,
    Rejected(AllocationRejected),
}

/// Prices, selects and sizes new spreads.
pub struct EntryPlanner<'a> {
    forecaster: &'a dyn Forecaster,
    params: ForecastParams,
    estimator: VolatilityEstimator,
    selector: SpreadSelector,
    sizer: PositionSizer,
    /// Years to expiration used to price new spreads.
    time_to_expiry: f64,
}

impl<'a> EntryPlanner<'a> {
    pub fn new(
        forecaster: &'a dyn Forecaster,
        params: ForecastParams,
        estimator: VolatilityEstimator,
        sizer: PositionSizer,
        time_to_expiry: f64,
    ) -> Self {
        Self {
            forecaster,
            params,
            estimator,
            selector: SpreadSelector::new(),
            sizer,
            time_to_expiry,
        }
    }

    pub fn estimator(&self) -> &VolatilityEstimator {
        &self.estimator
    }

    /// Attempt one entry. Errors are failures of this asset at this step only.
    pub fn enter<R: Rng + ?Sized>(
        &self,
        ledger: &mut PositionLedger,
        request: &EntryRequest<'_>,
        rng: &mut R,
    ) -> Result<EntryOutcome, EngineError> {
        let sigma = self.estimator.estimate(request.window)?;
        let forecast = self.forecaster.forecast(request.window, &self.params)?;

        let quote = EntryQuote {
            asset: request.asset.to_string(),
            spot: request.spot,
            sigma,
            time_to_expiry: self.time_to_expiry,
            risk_free_rate: request.risk_free_rate,
            expiration: request.expiration,
        };

        let candidate = match self.selector.select(&forecast.interval, &quote, rng)? {
            SelectionOutcome::Selected(c) => c,
            SelectionOutcome::NoEligibleCandidate => {
                debug!(asset = request.asset, step = request.step, "No eligible spread");
                return Ok(EntryOutcome::NoEligibleCandidate);
            }
        };

        let sizing = self.sizer.size(candidate.spread_cost);
        match ledger.open(candidate, &sizing, request.step) {
            Ok(position) => Ok(EntryOutcome::Opened(position.clone())),
            Err(rejected) => {
                debug!(asset = request.asset, step = request.step, %rejected, "Entry rejected");
                Ok(EntryOutcome::Rejected(rejected))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreconditionError;
    use crate::forecast::{Forecast, ForecastError, ForecastInterval};
    use crate::risk::PositionSizerConfig;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn band(low: f64, high: f64) -> impl Fn(&[f64], &ForecastParams) -> Result<Forecast, ForecastError> {
        move |_: &[f64], _: &ForecastParams| -> Result<Forecast, ForecastError> {
            Ok(Forecast {
                point: (low + high) / 2.0,
                interval: ForecastInterval::new(low, high)?,
            })
        }
    }

    fn window() -> Vec<f64> {
        (0..253).map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn test_entry_signal() {
        assert!(entry_signal(104.0, Some(105.0), Some(100.0)));
        assert!(!entry_signal(106.0, Some(105.0), Some(100.0)));
        assert!(!entry_signal(90.0, Some(95.0), Some(100.0)));
        assert!(!entry_signal(90.0, None, Some(100.0)));
        assert!(!entry_signal(90.0, Some(95.0), None));
    }

    #[test]
    fn test_enter_opens_position() {
        let forecaster = band(95.0, 130.0);
        let planner = EntryPlanner::new(
            &forecaster,
            ForecastParams::default(),
            VolatilityEstimator::default(),
            PositionSizer::new(PositionSizerConfig::default(), 100.0),
            2.0,
        );
        let mut ledger = PositionLedger::new(PositionSizerConfig::default());
        let w = window();
        let request = EntryRequest {
            asset: "SPY",
            spot: 100.0,
            window: &w,
            risk_free_rate: 0.04,
            step: 5,
            expiration: 735,
        };

        let mut opened = 0;
        for seed in 0..10 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            match planner.enter(&mut ledger, &request, &mut rng).unwrap() {
                EntryOutcome::Opened(position) => {
                    opened += 1;
                    assert_eq!(position.entry_step, 5);
                    assert_eq!(position.spread.expiration, 735);
                    assert!(position.contracts >= 1);
                }
                EntryOutcome::Rejected(_) | EntryOutcome::NoEligibleCandidate => {}
            }
        }
        assert!(opened >= 1);
        assert!(ledger.current_allocation("SPY") < PositionSizerConfig::default().asset_cap());
    }

    #[test]
    fn test_enter_without_candidates() {
        let forecaster = band(80.0, 99.0);
        let planner = EntryPlanner::new(
            &forecaster,
            ForecastParams::default(),
            VolatilityEstimator::default(),
            PositionSizer::new(PositionSizerConfig::default(), 100.0),
            2.0,
        );
        let mut ledger = PositionLedger::new(PositionSizerConfig::default());
        let w = window();
        let request = EntryRequest {
            asset: "SPY",
            spot: 100.0,
            window: &w,
            risk_free_rate: 0.04,
            step: 0,
            expiration: 730,
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert_eq!(
            planner.enter(&mut ledger, &request, &mut rng).unwrap(),
            EntryOutcome::NoEligibleCandidate
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_volatility_failure_is_an_error() {
        let forecaster = band(95.0, 130.0);
        let planner = EntryPlanner::new(
            &forecaster,
            ForecastParams::default(),
            VolatilityEstimator::default(),
            PositionSizer::new(PositionSizerConfig::default(), 100.0),
            2.0,
        );
        let mut ledger = PositionLedger::new(PositionSizerConfig::default());
        let request = EntryRequest {
            asset: "SPY",
            spot: 100.0,
            window: &[100.0],
            risk_free_rate: 0.04,
            step: 0,
            expiration: 730,
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let err = planner.enter(&mut ledger, &request, &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::Precondition(PreconditionError::NoReturns)));
    }
}

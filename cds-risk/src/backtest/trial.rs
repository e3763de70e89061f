//! One Monte Carlo trial.
//!
//! A trial picks one path index for the whole run, walks steps
//! 0..horizon_steps and at each step:
//! 1. Advances every open position through the lifecycle
//! 2. Records the step's realized PnL
//! 3. Checks every asset for the entry trigger and tries to open a spread
//!
//! The PnL trajectory is scaled by the contract multiplier at the end.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::entry::{entry_signal, EntryOutcome, EntryPlanner, EntryRequest};
use crate::config::SimulationConfig;
use crate::error::PreconditionError;
use crate::events::{Anomaly, EngineEvent, EventSink};
use crate::forecast::Forecaster;
use crate::portfolio::{ClosedTrade, MarketSnapshot, PortfolioState, PositionLifecycle};
use crate::pricing::{trailing_path_window, VolatilityEstimator};
use crate::risk::PositionSizer;
use crate::simulation::{AssetPaths, PathUniverse};

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub path_index: usize,
    /// Cumulative realized PnL in dollars, one value per step after the initial 0.
    pub pnl: Vec<f64>,
    pub closed: Vec<ClosedTrade>,
    /// Set when positions were still open at the end.
    pub anomaly: Option<Anomaly>,
    /// Asset-steps skipped because volatility, pricing or forecasting failed.
    pub step_failures: usize,
}

impl TrialResult {
    pub fn final_pnl(&self) -> f64 {
        self.pnl.last().copied().unwrap_or(0.0)
    }

    pub fn is_anomalous(&self) -> bool {
        self.anomaly.is_some()
    }

    /// Largest peak-to-trough fall of the cumulative PnL.
    pub fn max_drawdown(&self) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut max_dd: f64 = 0.0;
        for &v in &self.pnl {
            peak = peak.max(v);
            max_dd = max_dd.max(peak - v);
        }
        max_dd
    }
}

/// Market view of one path index at one step.
struct PathMarket<'a> {
    universe: &'a PathUniverse,
    path_index: usize,
    step: usize,
    estimator: &'a VolatilityEstimator,
    vol_window: usize,
}

impl PathMarket<'_> {
    fn asset(&self, asset: &str) -> Result<&AssetPaths, PreconditionError> {
        self.universe
            .get(asset)
            .ok_or_else(|| PreconditionError::UnknownAsset(asset.to_string()))
    }

    fn prices(&self, asset: &str) -> Result<&[f64], PreconditionError> {
        let paths = self.asset(asset)?;
        paths
            .paths
            .get(self.path_index)
            .map(|p| p.prices.as_slice())
            .ok_or_else(|| PreconditionError::UnknownAsset(asset.to_string()))
    }
}

impl MarketSnapshot for PathMarket<'_> {
    fn spot(&self, asset: &str) -> Result<f64, PreconditionError> {
        self.prices(asset)?
            .get(self.step)
            .copied()
            .ok_or_else(|| PreconditionError::InvalidParameter(format!("step {} past horizon", self.step)))
    }

    fn volatility(&self, asset: &str) -> Result<f64, PreconditionError> {
        let history = self.asset(asset)?.closes();
        let window = trailing_path_window(history, self.prices(asset)?, self.step, self.vol_window);
        self.estimator.estimate(&window)
    }

    fn risk_free_rate(&self, asset: &str) -> Result<f64, PreconditionError> {
        Ok(self.asset(asset)?.risk_free_rate())
    }
}

/// Runs single trials against a shared, read-only path universe.
pub struct TrialRunner<'a> {
    universe: &'a PathUniverse,
    events: &'a dyn EventSink,
    planner: EntryPlanner<'a>,
    lifecycle: PositionLifecycle,
    config: SimulationConfig,
}

impl<'a> TrialRunner<'a> {
    pub fn new(
        universe: &'a PathUniverse,
        config: &SimulationConfig,
        forecaster: &'a dyn Forecaster,
        events: &'a dyn EventSink,
    ) -> Self {
        let steps_per_year = config.paths.steps_per_year as f64;
        let planner = EntryPlanner::new(
            forecaster,
            config.forecast.clone(),
            VolatilityEstimator::new(config.strategy.vol_annualization),
            PositionSizer::new(config.sizing.clone(), config.strategy.contract_multiplier),
            config.expiration_steps() as f64 / steps_per_year,
        );
        Self {
            universe,
            events,
            planner,
            lifecycle: PositionLifecycle::new(&config.strategy, &config.paths),
            config: config.clone(),
        }
    }

    pub fn universe(&self) -> &PathUniverse {
        self.universe
    }

    /// Run one trial on a path index drawn uniformly from the universe.
    pub fn run<R: Rng + ?Sized>(&self, trial: usize, rng: &mut R) -> TrialResult {
        let path_index = rng.random_range(0..self.universe.num_paths());
        self.run_on_path(trial, path_index, rng)
    }

    /// Run one trial on a fixed path index.
    pub fn run_on_path<R: Rng + ?Sized>(
        &self,
        trial: usize,
        path_index: usize,
        rng: &mut R,
    ) -> TrialResult {
        let horizon = self.universe.horizon_steps();
        let expiration_steps = self.config.expiration_steps();
        let vol_window = self.config.strategy.vol_window;
        let mut state = PortfolioState::new(self.config.sizing.clone());
        let mut step_failures = 0;

        for step in 0..horizon {
            let market = PathMarket {
                universe: self.universe,
                path_index,
                step,
                estimator: self.planner.estimator(),
                vol_window,
            };

            let report = self.lifecycle.advance(&mut state.ledger, step as i64, &market);
            for failure in &report.failures {
                warn!(trial, step, asset = %failure.asset, error = %failure.error, "Could not evaluate position");
            }
            step_failures += report.failures.len();
            for trade in &report.closed {
                self.events.emit(EngineEvent::PositionClosed {
                    trial: Some(trial),
                    trade: trade.clone(),
                });
            }
            state.record(report);

            if horizon - step <= expiration_steps {
                continue;
            }

            for asset in self.universe.assets() {
                let Some(path) = asset.paths.get(path_index) else {
                    continue;
                };
                let price = path.prices[step];
                if !entry_signal(price, path.ma_short[step], path.ma_long[step]) {
                    continue;
                }

                let window = trailing_path_window(asset.closes(), &path.prices, step, vol_window);
                let request = EntryRequest {
                    asset: asset.asset(),
                    spot: price,
                    window: &window,
                    risk_free_rate: asset.risk_free_rate(),
                    step: step as i64,
                    expiration: (step + expiration_steps) as i64,
                };
                match self.planner.enter(&mut state.ledger, &request, &mut *rng) {
                    Ok(EntryOutcome::Opened(position)) => self.events.emit(EngineEvent::CandidateTrade {
                        trial: Some(trial),
                        step: step as i64,
                        position,
                    }),
                    Ok(EntryOutcome::NoEligibleCandidate | EntryOutcome::Rejected(_)) => {}
                    Err(e) => {
                        warn!(trial, step, asset = asset.asset(), error = %e, "Entry evaluation failed");
                        step_failures += 1;
                    }
                }
            }
        }

        let (pnl, closed, ledger) = state.finish(self.config.strategy.contract_multiplier);
        let anomaly = if ledger.is_empty() {
            None
        } else {
            let anomaly = Anomaly {
                trial: Some(trial),
                path_index: Some(path_index),
                open_positions: ledger.len(),
                committed: ledger.total_committed(),
                assets: ledger.positions().iter().map(|p| p.asset().to_string()).collect(),
            };
            self.events.emit(EngineEvent::Anomaly(anomaly.clone()));
            Some(anomaly)
        };

        TrialResult {
            trial,
            path_index,
            pnl,
            closed,
            anomaly,
            step_failures,
        }
    }
}

//! Historical-date replay.
//!
//! Walks the shared date index of aligned asset histories with the same
//! entry pipeline and lifecycle as a simulated trial:
//! - Entries only on dates in [first + 1 year, last - expiration years]
//! - Entry trigger from the historical 50/100-step moving averages
//! - Volatility and forecasts from the trailing year of closes
//! - Steps are calendar day numbers, so expirations are calendar dates
//!
//! The lifecycle keeps running until the last date so positions can settle.

use chrono::{Datelike, Months, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::entry::{entry_signal, EntryOutcome, EntryPlanner, EntryRequest};
use crate::config::SimulationConfig;
use crate::data::{check_aligned, AssetHistory};
use crate::error::PreconditionError;
use crate::events::{Anomaly, EngineEvent, EventSink};
use crate::forecast::Forecaster;
use crate::portfolio::{ClosedTrade, MarketSnapshot, PortfolioState, PositionLifecycle};
use crate::pricing::VolatilityEstimator;
use crate::risk::PositionSizer;

/// Calendar days of trailing closes used for volatility and forecasts.
const TRAILING_DAYS: i64 = 365;

/// Outcome of a replay over the full date index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub dates: Vec<NaiveDate>,
    /// Cumulative realized PnL in dollars: the initial 0 then one value per date.
    pub pnl: Vec<f64>,
    pub closed: Vec<ClosedTrade>,
    pub anomaly: Option<Anomaly>,
    pub step_failures: usize,
}

impl ReplayResult {
    pub fn final_pnl(&self) -> f64 {
        self.pnl.last().copied().unwrap_or(0.0)
    }

    pub fn is_anomalous(&self) -> bool {
        self.anomaly.is_some()
    }
}

/// Day number used as the step unit.
fn day_number(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64
}

/// Market view of every history on one date.
struct HistoryMarket<'a> {
    histories: &'a [AssetHistory],
    index: usize,
    date: NaiveDate,
    estimator: &'a VolatilityEstimator,
}

impl HistoryMarket<'_> {
    fn history(&self, asset: &str) -> Result<&AssetHistory, PreconditionError> {
        self.histories
            .iter()
            .find(|h| h.asset == asset)
            .ok_or_else(|| PreconditionError::UnknownAsset(asset.to_string()))
    }
}

impl MarketSnapshot for HistoryMarket<'_> {
    fn spot(&self, asset: &str) -> Result<f64, PreconditionError> {
        Ok(self.history(asset)?.bars[self.index].close)
    }

    fn volatility(&self, asset: &str) -> Result<f64, PreconditionError> {
        let closes: Vec<f64> = self
            .history(asset)?
            .trailing_window(self.date, TRAILING_DAYS)
            .iter()
            .map(|b| b.close)
            .collect();
        self.estimator.estimate(&closes)
    }

    fn risk_free_rate(&self, asset: &str) -> Result<f64, PreconditionError> {
        Ok(self.history(asset)?.bars[self.index].risk_free_rate)
    }
}

/// Replays the strategy over real history.
pub struct HistoricalReplay<'a> {
    histories: &'a [AssetHistory],
    events: &'a dyn EventSink,
    planner: EntryPlanner<'a>,
    lifecycle: PositionLifecycle,
    config: SimulationConfig,
}

impl<'a> HistoricalReplay<'a> {
    /// Fails unless there is at least one history and all share the same dates.
    pub fn new(
        histories: &'a [AssetHistory],
        config: &SimulationConfig,
        forecaster: &'a dyn Forecaster,
        events: &'a dyn EventSink,
    ) -> Result<Self, PreconditionError> {
        if histories.iter().all(|h| h.is_empty()) {
            return Err(PreconditionError::InvalidParameter(
                "replay needs at least one non-empty history".to_string(),
            ));
        }
        check_aligned(histories)?;

        let planner = EntryPlanner::new(
            forecaster,
            config.forecast.clone(),
            VolatilityEstimator::new(config.strategy.vol_annualization),
            PositionSizer::new(config.sizing.clone(), config.strategy.contract_multiplier),
            config.strategy.years_to_expiration as f64,
        );
        Ok(Self {
            histories,
            events,
            planner,
            lifecycle: PositionLifecycle::new(&config.strategy, &config.paths),
            config: config.clone(),
        })
    }

    /// Dates on which entries may be opened.
    pub fn entry_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let reference = self.histories.first()?;
        let first = reference.first_date()?.checked_add_months(Months::new(12))?;
        let last = reference
            .last_date()?
            .checked_sub_months(Months::new(12 * self.config.strategy.years_to_expiration))?;
        (first <= last).then_some((first, last))
    }

    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> ReplayResult {
        let dates: Vec<NaiveDate> = self.histories[0].bars.iter().map(|b| b.date).collect();
        let window = self.entry_window();
        let expiration_months = Months::new(12 * self.config.strategy.years_to_expiration);
        let mut state = PortfolioState::new(self.config.sizing.clone());
        let mut step_failures = 0;

        match window {
            Some((from, to)) => info!(dates = dates.len(), %from, %to, "Starting historical replay"),
            None => warn!(dates = dates.len(), "History too short for any entry date"),
        }

        for (index, &date) in dates.iter().enumerate() {
            let now = day_number(date);
            let market = HistoryMarket {
                histories: self.histories,
                index,
                date,
                estimator: self.planner.estimator(),
            };

            let report = self.lifecycle.advance(&mut state.ledger, now, &market);
            for failure in &report.failures {
                warn!(%date, asset = %failure.asset, error = %failure.error, "Could not evaluate position");
            }
            step_failures += report.failures.len();
            for trade in &report.closed {
                self.events.emit(EngineEvent::PositionClosed {
                    trial: None,
                    trade: trade.clone(),
                });
            }
            state.record(report);

            let Some((from, to)) = window else {
                continue;
            };
            if date < from || date > to {
                continue;
            }
            let Some(expiration) = date.checked_add_months(expiration_months) else {
                continue;
            };

            for history in self.histories {
                let bar = &history.bars[index];
                if !entry_signal(bar.close, bar.ma_50, bar.ma_100) {
                    continue;
                }

                let closes: Vec<f64> = history
                    .trailing_window(date, TRAILING_DAYS)
                    .iter()
                    .map(|b| b.close)
                    .collect();
                let request = EntryRequest {
                    asset: &history.asset,
                    spot: bar.close,
                    window: &closes,
                    risk_free_rate: bar.risk_free_rate,
                    step: now,
                    expiration: day_number(expiration),
                };
                match self.planner.enter(&mut state.ledger, &request, &mut *rng) {
                    Ok(EntryOutcome::Opened(position)) => self.events.emit(EngineEvent::CandidateTrade {
                        trial: None,
                        step: now,
                        position,
                    }),
                    Ok(EntryOutcome::NoEligibleCandidate | EntryOutcome::Rejected(_)) => {}
                    Err(e) => {
                        warn!(%date, asset = %history.asset, error = %e, "Entry evaluation failed");
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
                trial: None,
                path_index: None,
                open_positions: ledger.len(),
                committed: ledger.total_committed(),
                assets: ledger.positions().iter().map(|p| p.asset().to_string()).collect(),
            };
            self.events.emit(EngineEvent::Anomaly(anomaly.clone()));
            Some(anomaly)
        };

        info!(
            trades = closed.len(),
            final_pnl = pnl.last().copied().unwrap_or(0.0),
            anomalous = anomaly.is_some(),
            "Historical replay complete"
        );

        ReplayResult {
            dates,
            pnl,
            closed,
            anomaly,
            step_failures,
        }
    }
}

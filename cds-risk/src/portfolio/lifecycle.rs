//! Position lifecycle state machine.
//!
//! Every open position is evaluated once per step:
//!
//! | remaining to expiration | rule |
//! |---|---|
//! | <= 0 | expire at intrinsic value (ITM / OTM / between strikes) |
//! | 1..=window | reprice with Black-Scholes; close at +35% or -50% spread return |
//! | > window | hold |
//!
//! Decisions for the whole ledger are collected first and applied afterwards,
//! so the outcome of a step does not depend on iteration order.

use serde::{Deserialize, Serialize};

use super::ledger::{Position, PositionId, PositionLedger};
use crate::config::{PathConfig, StrategyConfig};
use crate::error::PreconditionError;
use crate::pricing::{call_spread_intrinsic, price_call};

/// Terminal states of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitState {
    ClosedEarlyProfit,
    ClosedEarlyLoss,
    ExpiredItm,
    ExpiredOtm,
    ExpiredAtBoundary,
}

impl ExitState {
    pub fn is_expiration(&self) -> bool {
        matches!(
            self,
            ExitState::ExpiredItm | ExitState::ExpiredOtm | ExitState::ExpiredAtBoundary
        )
    }
}

/// Market inputs the lifecycle reads for one asset at the current step.
pub trait MarketSnapshot {
    fn spot(&self, asset: &str) -> Result<f64, PreconditionError>;

    /// Annualized volatility for repricing.
    fn volatility(&self, asset: &str) -> Result<f64, PreconditionError>;

    fn risk_free_rate(&self, asset: &str) -> Result<f64, PreconditionError>;
}

/// A terminal transition decided for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub position_id: PositionId,
    pub state: ExitState,
    /// Underlying price at the decision.
    pub spot: f64,
    /// Spread value per share (model price, or intrinsic at expiration).
    pub spread_value: f64,
    pub spread_return: f64,
    /// Realized PnL per share times contracts.
    pub pnl: f64,
}

/// Record of a settled position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub asset: String,
    pub entry_step: i64,
    pub exit_step: i64,
    pub state: ExitState,
    pub long_strike: f64,
    pub short_strike: f64,
    pub contracts: i64,
    pub spread_cost: f64,
    pub max_profit: f64,
    pub spread_return: f64,
    /// Realized PnL; per-share units until scaled by the contract multiplier.
    pub pnl: f64,
}

impl ClosedTrade {
    fn new(position: &Position, transition: &Transition, exit_step: i64) -> Self {
        Self {
            position_id: position.id,
            asset: position.spread.asset.clone(),
            entry_step: position.entry_step,
            exit_step,
            state: transition.state,
            long_strike: position.spread.long_strike,
            short_strike: position.spread.short_strike,
            contracts: position.contracts,
            spread_cost: position.spread.spread_cost,
            max_profit: position.spread.max_profit,
            spread_return: transition.spread_return,
            pnl: transition.pnl,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// A position that could not be evaluated this step. It stays open.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub position_id: PositionId,
    pub asset: String,
    pub error: PreconditionError,
}

/// Outcome of advancing the ledger by one step.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub closed: Vec<ClosedTrade>,
    pub failures: Vec<StepFailure>,
}

impl StepReport {
    /// Sum of realized PnL this step.
    pub fn pnl(&self) -> f64 {
        self.closed.iter().map(|c| c.pnl).sum()
    }
}

/// Exit rules of the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionLifecycle {
    /// Early exits apply when remaining steps are in 1..=early_exit_window.
    pub early_exit_window: i64,
    pub early_profit_pct: f64,
    pub early_loss_pct: f64,
    /// Steps per year, converts remaining steps to years.
    pub steps_per_year: f64,
}

impl Default for PositionLifecycle {
    fn default() -> Self {
        Self::new(&StrategyConfig::default(), &PathConfig::default())
    }
}

impl PositionLifecycle {
    pub fn new(strategy: &StrategyConfig, paths: &PathConfig) -> Self {
        Self {
            early_exit_window: strategy.early_exit_window,
            early_profit_pct: strategy.early_profit_pct,
            early_loss_pct: strategy.early_loss_pct,
            steps_per_year: paths.steps_per_year as f64,
        }
    }

    /// Decide the transition of one position at `now`, if any.
    pub fn decide<M: MarketSnapshot + ?Sized>(
        &self,
        position: &Position,
        now: i64,
        market: &M,
    ) -> Result<Option<Transition>, PreconditionError> {
        let remaining = position.remaining(now);
        if remaining > self.early_exit_window {
            return Ok(None);
        }

        let spread = &position.spread;
        let contracts = position.contracts as f64;
        let spot = market.spot(spread.asset.as_str())?;

        if remaining <= 0 {
            let spread_value = call_spread_intrinsic(spot, spread.long_strike, spread.short_strike);
            let spread_return = spread.spread_return(spread_value);
            let (state, pnl) = if spot > spread.short_strike {
                (ExitState::ExpiredItm, spread.max_profit * contracts)
            } else if spot < spread.long_strike {
                (ExitState::ExpiredOtm, -spread.spread_cost * contracts)
            } else {
                (
                    ExitState::ExpiredAtBoundary,
                    spread_return * spread.max_profit * contracts,
                )
            };
            return Ok(Some(Transition {
                position_id: position.id,
                state,
                spot,
                spread_value,
                spread_return,
                pnl,
            }));
        }

        let sigma = market.volatility(spread.asset.as_str())?;
        let rate = market.risk_free_rate(spread.asset.as_str())?;
        let tau = remaining as f64 / self.steps_per_year;
        let long = price_call(spot, spread.long_strike, sigma, tau, rate)?;
        let short = price_call(spot, spread.short_strike, sigma, tau, rate)?;
        let spread_value = long - short;
        let spread_return = spread.spread_return(spread_value);

        let exit = if spread_return >= self.early_profit_pct {
            Some((
                ExitState::ClosedEarlyProfit,
                spread.max_profit * self.early_profit_pct * contracts,
            ))
        } else if spread_return <= self.early_loss_pct {
            Some((
                ExitState::ClosedEarlyLoss,
                spread.spread_cost * self.early_loss_pct * contracts,
            ))
        } else {
            None
        };

        Ok(exit.map(|(state, pnl)| Transition {
            position_id: position.id,
            state,
            spot,
            spread_value,
            spread_return,
            pnl,
        }))
    }

    /// Evaluate every open position, then remove the settled ones.
    ///
    /// A failure on one position leaves it open and does not affect others.
    pub fn advance<M: MarketSnapshot + ?Sized>(
        &self,
        ledger: &mut PositionLedger,
        now: i64,
        market: &M,
    ) -> StepReport {
        let mut transitions = Vec::new();
        let mut failures = Vec::new();

        for position in ledger.positions() {
            match self.decide(position, now, market) {
                Ok(Some(t)) => transitions.push(t),
                Ok(None) => {}
                Err(error) => failures.push(StepFailure {
                    position_id: position.id,
                    asset: position.asset().to_string(),
                    error,
                }),
            }
        }

        let closed = transitions
            .iter()
            .filter_map(|t| {
                ledger
                    .close(t.position_id)
                    .map(|position| ClosedTrade::new(&position, t, now))
            })
            .collect();

        StepReport { closed, failures }
    }
}

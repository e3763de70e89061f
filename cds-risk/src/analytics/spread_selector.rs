//! Call debit spread selection.
//!
//! The forecast interval, rounded to whole dollars, defines the strike
//! universe. Every (long, short) pair is priced and kept when:
//! - long strike < short strike (debit vertical)
//! - short strike > spot (out of the money)
//! - max profit > spread cost
//! - spread cost is positive
//!
//! One survivor is drawn uniformly at random. Candidates are not ranked.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;
use crate::forecast::ForecastInterval;
use crate::pricing::price_call;

/// A priced long-call / short-call vertical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadCandidate {
    /// Underlying asset.
    pub asset: String,
    /// Expiration in step units (simulation step or day number).
    pub expiration: i64,
    /// Bought call strike.
    pub long_strike: f64,
    /// Sold call strike.
    pub short_strike: f64,
    /// Premium of the bought call.
    pub long_premium: f64,
    /// Premium of the sold call.
    pub short_premium: f64,
    /// Net debit: long premium - short premium.
    pub spread_cost: f64,
    /// Strike width - spread cost.
    pub max_profit: f64,
}

impl SpreadCandidate {
    pub fn width(&self) -> f64 {
        self.short_strike - self.long_strike
    }

    /// Whether the candidate is an acceptable out-of-the-money debit spread at `spot`.
    pub fn is_eligible(&self, spot: f64) -> bool {
        self.long_strike < self.short_strike
            && self.short_strike > spot
            && self.max_profit > self.spread_cost
            && self.spread_cost > 0.0
            && self.spread_cost.is_finite()
    }

    /// Return on the entry debit if the spread is now worth `value`.
    pub fn spread_return(&self, value: f64) -> f64 {
        (value - self.spread_cost) / self.spread_cost
    }
}

/// Market inputs for pricing entries on one asset at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryQuote {
    pub asset: String,
    pub spot: f64,
    /// Annualized volatility fed to the pricer.
    pub sigma: f64,
    /// Years until the spread expires.
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
    /// Expiration stamped on the candidates, in step units.
    pub expiration: i64,
}

/// Result of a selection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Selected(SpreadCandidate),
    /// No pair survived the filters. Expected and frequent.
    NoEligibleCandidate,
}

impl SelectionOutcome {
    pub fn candidate(self) -> Option<SpreadCandidate> {
        match self {
            SelectionOutcome::Selected(c) => Some(c),
            SelectionOutcome::NoEligibleCandidate => None,
        }
    }
}

/// Random selector over eligible spreads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadSelector;

impl SpreadSelector {
    pub fn new() -> Self {
        Self
    }

    /// Whole-dollar strikes in the rounded interval. Non-positive strikes are skipped.
    pub fn strike_universe(interval: &ForecastInterval) -> Vec<f64> {
        let low = interval.low().round_ties_even().max(1.0);
        let high = interval.high().round_ties_even();
        if high < low {
            return Vec::new();
        }
        let count = (high - low) as usize + 1;
        (0..count).map(|i| low + i as f64).collect()
    }

    /// Price every strike pair and keep the eligible ones.
    pub fn candidates(
        &self,
        interval: &ForecastInterval,
        quote: &EntryQuote,
    ) -> Result<Vec<SpreadCandidate>, PreconditionError> {
        let strikes = Self::strike_universe(interval);
        let chain: Vec<(f64, f64)> = strikes
            .iter()
            .map(|&k| {
                price_call(quote.spot, k, quote.sigma, quote.time_to_expiry, quote.risk_free_rate)
                    .map(|premium| (k, premium))
            })
            .collect::<Result<_, _>>()?;

        let mut out = Vec::new();
        for &(long_strike, long_premium) in &chain {
            for &(short_strike, short_premium) in &chain {
                let spread_cost = long_premium - short_premium;
                let candidate = SpreadCandidate {
                    asset: quote.asset.clone(),
                    expiration: quote.expiration,
                    long_strike,
                    short_strike,
                    long_premium,
                    short_premium,
                    spread_cost,
                    max_profit: short_strike - long_strike - spread_cost,
                };
                if candidate.is_eligible(quote.spot) {
                    out.push(candidate);
                }
            }
        }
        Ok(out)
    }

    /// Draw one eligible spread uniformly at random.
    pub fn select<R: Rng + ?Sized>(
        &self,
        interval: &ForecastInterval,
        quote: &EntryQuote,
        rng: &mut R,
    ) -> Result<SelectionOutcome, PreconditionError> {
        let mut eligible = self.candidates(interval, quote)?;
        if eligible.is_empty() {
            return Ok(SelectionOutcome::NoEligibleCandidate);
        }
        let pick = rng.random_range(0..eligible.len());
        Ok(SelectionOutcome::Selected(eligible.swap_remove(pick)))
    }
}

//! Outcome metrics.
//!
//! Aggregates a batch of trials into a risk/return profile:
//! - Final PnL distribution (mean, median, percentiles)
//! - Tail risk (VaR, CVaR, probability of loss)
//! - Path risk (maximum drawdown), trade count and win rate

pub mod distribution;

pub use distribution::DistributionSummary;

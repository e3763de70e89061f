//! Outcome distribution of a batch of trials.
//!
//! Summarizes the final PnL of every trial (mean, dispersion, tails) and the
//! path-level statistics collected along the way (drawdowns, trades).
//!
//! Quantiles use the statrs estimator (R-8, median-unbiased).

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::backtest::TrialResult;

/// Risk/return profile of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub trials: usize,
    pub anomalies: usize,
    pub step_failures: usize,

    // Final PnL distribution (dollars)
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub p95: f64,

    /// 95% value at risk, reported as a positive loss.
    pub var_95: f64,
    /// Mean loss beyond the 95% VaR (expected shortfall).
    pub cvar_95: f64,
    pub prob_loss: f64,

    pub mean_max_drawdown: f64,
    pub total_trades: usize,
    pub win_rate: f64,
}

impl DistributionSummary {
    /// Summarize a batch. None when there are no trials.
    pub fn from_trials(results: &[TrialResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let finals: Vec<f64> = results.iter().map(|r| r.final_pnl()).collect();
        let n = finals.len() as f64;

        let mean = finals.iter().mean();
        let std_dev = if finals.len() > 1 {
            finals.iter().std_dev()
        } else {
            0.0
        };

        let mut data = Data::new(finals.clone());
        let median = data.quantile(0.5);
        let p5 = data.quantile(0.05);
        let p95 = data.quantile(0.95);
        let min = finals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let var_95 = -p5;
        let tail: Vec<f64> = finals.iter().copied().filter(|v| *v <= p5).collect();
        let cvar_95 = if tail.is_empty() {
            var_95
        } else {
            -(tail.iter().sum::<f64>() / tail.len() as f64)
        };

        let losses = finals.iter().filter(|v| **v < 0.0).count();
        let mean_max_drawdown = results.iter().map(|r| r.max_drawdown()).sum::<f64>() / n;

        let total_trades: usize = results.iter().map(|r| r.closed.len()).sum();
        let wins: usize = results
            .iter()
            .map(|r| r.closed.iter().filter(|c| c.is_win()).count())
            .sum();
        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };

        Some(Self {
            trials: results.len(),
            anomalies: results.iter().filter(|r| r.is_anomalous()).count(),
            step_failures: results.iter().map(|r| r.step_failures).sum(),
            mean,
            median,
            std_dev,
            min,
            max,
            p5,
            p95,
            var_95,
            cvar_95,
            prob_loss: losses as f64 / n,
            mean_max_drawdown,
            total_trades,
            win_rate,
        })
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        format!(
            "Monte Carlo Results ({} trials)\n\
             ----------------------------------------\n\
             Mean Final PnL:   ${:.2}\n\
             Median Final PnL: ${:.2}\n\
             Std Dev:          ${:.2}\n\
             5th / 95th pct:   ${:.2} / ${:.2}\n\
             VaR 95%:          ${:.2}\n\
             CVaR 95%:         ${:.2}\n\
             P(loss):          {:.1}%\n\
             Mean Max DD:      ${:.2}\n\
             \n\
             Trades: {} (win rate {:.1}%)\n\
             Anomalies: {}, step failures: {}",
            self.trials,
            self.mean,
            self.median,
            self.std_dev,
            self.p5,
            self.p95,
            self.var_95,
            self.cvar_95,
            self.prob_loss * 100.0,
            self.mean_max_drawdown,
            self.total_trades,
            self.win_rate * 100.0,
            self.anomalies,
            self.step_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(i: usize, pnl: Vec<f64>) -> TrialResult {
        TrialResult {
            trial: i,
            path_index: 0,
            pnl,
            closed: vec![],
            anomaly: None,
            step_failures: 0,
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(DistributionSummary::from_trials(&[]).is_none());
    }

    #[test]
    fn test_single_trial() {
        let summary = DistributionSummary::from_trials(&[trial(0, vec![0.0, 50.0, -20.0])]).unwrap();
        assert_eq!(summary.trials, 1);
        assert_eq!(summary.mean, -20.0);
        assert_eq!(summary.std_dev, 0.0);
        assert_eq!(summary.prob_loss, 1.0);
        assert_eq!(summary.mean_max_drawdown, 70.0);
    }

    #[test]
    fn test_distribution_shape() {
        let results: Vec<TrialResult> = (0..100)
            .map(|i| trial(i, vec![0.0, i as f64 - 20.0]))
            .collect();
        let summary = DistributionSummary::from_trials(&results).unwrap();

        assert_eq!(summary.trials, 100);
        assert!((summary.mean - 29.5).abs() < 1e-9);
        assert_eq!(summary.min, -20.0);
        assert_eq!(summary.max, 79.0);
        assert!(summary.p5 < summary.median && summary.median < summary.p95);
        assert!((summary.median - 29.5).abs() < 1e-9);
        assert_eq!(summary.var_95, -summary.p5);
        assert!(summary.cvar_95 >= summary.var_95);
        assert!((summary.prob_loss - 0.2).abs() < 1e-12);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
    }
}

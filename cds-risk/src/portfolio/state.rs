//! Per-trial portfolio state: the ledger plus the realized PnL trajectory.

use super::ledger::PositionLedger;
use super::lifecycle::{ClosedTrade, StepReport};
use crate::risk::PositionSizerConfig;

/// Fresh for every trial and never shared between trials.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub ledger: PositionLedger,
    /// Cumulative realized PnL, starting at 0.
    pnl: Vec<f64>,
    closed: Vec<ClosedTrade>,
}

impl PortfolioState {
    pub fn new(config: PositionSizerConfig) -> Self {
        Self {
            ledger: PositionLedger::new(config),
            pnl: vec![0.0],
            closed: Vec::new(),
        }
    }

    /// Fold a step's settlements into the trajectory (one entry per step).
    pub fn record(&mut self, report: StepReport) {
        let last = self.realized();
        self.pnl.push(last + report.pnl());
        self.closed.extend(report.closed);
    }

    pub fn realized(&self) -> f64 {
        self.pnl.last().copied().unwrap_or(0.0)
    }

    pub fn pnl(&self) -> &[f64] {
        &self.pnl
    }

    pub fn closed(&self) -> &[ClosedTrade] {
        &self.closed
    }

    /// Consume the state, scaling PnL by the contract multiplier.
    pub fn finish(self, multiplier: f64) -> (Vec<f64>, Vec<ClosedTrade>, PositionLedger) {
        let pnl = self.pnl.into_iter().map(|v| v * multiplier).collect();
        let closed = self
            .closed
            .into_iter()
            .map(|mut c| {
                c.pnl *= multiplier;
                c
            })
            .collect();
        (pnl, closed, self.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_steps_keep_pnl_flat() {
        let mut state = PortfolioState::new(PositionSizerConfig::default());
        state.record(StepReport::default());
        state.record(StepReport::default());
        assert_eq!(state.pnl(), &[0.0, 0.0, 0.0]);

        let (pnl, closed, ledger) = state.finish(100.0);
        assert_eq!(pnl, vec![0.0, 0.0, 0.0]);
        assert!(closed.is_empty());
        assert!(ledger.is_empty());
    }
}

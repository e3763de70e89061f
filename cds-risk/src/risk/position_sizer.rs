//! Position sizing module.
//!
//! Fixed-fraction sizing of debit spreads:
//! - Trade size: 0.6% of the account per entry
//! - Contracts: trade size / (spread cost x multiplier), rounded half-to-even
//! - Per-asset allocation cap: 1% of the account
//! - Total committed capital: at most the account size

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

/// Position sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizerConfig {
    /// Account size in dollars.
    pub account_size: Decimal,
    /// Capital per trade as percentage of the account.
    pub trade_size_pct: f64,
    /// Maximum open allocation per asset as percentage of the account.
    pub max_asset_allocation_pct: f64,
    /// Maximum total open allocation as percentage of the account.
    pub max_total_allocation_pct: f64,
}

impl Default for PositionSizerConfig {
    fn default() -> Self {
        Self {
            account_size: Decimal::from(100_000),
            trade_size_pct: 0.6,
            max_asset_allocation_pct: 1.0,
            max_total_allocation_pct: 100.0,
        }
    }
}

impl PositionSizerConfig {
    pub fn validate(&self) -> Result<(), PreconditionError> {
        if self.account_size <= Decimal::ZERO {
            return Err(PreconditionError::InvalidParameter(
                "sizing.account_size must be positive".to_string(),
            ));
        }
        for (name, pct) in [
            ("sizing.trade_size_pct", self.trade_size_pct),
            ("sizing.max_asset_allocation_pct", self.max_asset_allocation_pct),
            ("sizing.max_total_allocation_pct", self.max_total_allocation_pct),
        ] {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(PreconditionError::InvalidParameter(format!(
                    "{} must be in (0, 100], got {}",
                    name, pct
                )));
            }
        }
        Ok(())
    }

    fn fraction_of_account(&self, pct: f64) -> Decimal {
        Decimal::try_from(pct).unwrap_or(Decimal::ZERO) / Decimal::ONE_HUNDRED * self.account_size
    }

    /// Dollars targeted by one entry.
    pub fn trade_size(&self) -> Decimal {
        self.fraction_of_account(self.trade_size_pct)
    }

    /// Per-asset allocation cap in dollars.
    pub fn asset_cap(&self) -> Decimal {
        self.fraction_of_account(self.max_asset_allocation_pct)
    }

    /// Total allocation cap in dollars.
    pub fn total_cap(&self) -> Decimal {
        self.fraction_of_account(self.max_total_allocation_pct)
    }
}

/// Result of position sizing calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingResult {
    /// Number of contracts (0 when the spread is too expensive).
    pub contracts: i64,
    /// Dollars targeted for the trade.
    pub trade_size: Decimal,
    /// Dollars committed: spread cost x multiplier x contracts.
    pub position_size: Decimal,
}

impl SizingResult {
    /// Check if the trade is allowed (at least 1 contract).
    pub fn is_allowed(&self) -> bool {
        self.contracts >= 1
    }
}

/// Position sizer for determining contract counts.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: PositionSizerConfig,
    multiplier: f64,
}

impl PositionSizer {
    pub fn new(config: PositionSizerConfig, multiplier: f64) -> Self {
        Self { config, multiplier }
    }

    pub fn config(&self) -> &PositionSizerConfig {
        &self.config
    }

    /// Size a spread bought at `spread_cost` per share.
    ///
    /// Non-positive or non-finite costs size to zero contracts.
    pub fn size(&self, spread_cost: f64) -> SizingResult {
        let trade_size = self.config.trade_size();
        let trade_size_f64: f64 = trade_size.try_into().unwrap_or(0.0);
        let contract_cost = spread_cost * self.multiplier;

        let raw = trade_size_f64 / contract_cost;
        let contracts = if contract_cost > 0.0 && raw.is_finite() {
            raw.round_ties_even() as i64
        } else {
            0
        };

        let position_size =
            Decimal::try_from(contract_cost * contracts as f64).unwrap_or(Decimal::ZERO);

        SizingResult {
            contracts,
            trade_size,
            position_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> PositionSizer {
        PositionSizer::new(PositionSizerConfig::default(), 100.0)
    }

    #[test]
    fn test_default_caps() {
        let config = PositionSizerConfig::default();
        assert_eq!(config.trade_size(), dec!(600));
        assert_eq!(config.asset_cap(), dec!(1000));
        assert_eq!(config.total_cap(), dec!(100000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_size_rounds_contracts() {
        // 600 / 250 = 2.4 -> 2
        let result = sizer().size(2.5);
        assert_eq!(result.contracts, 2);
        assert_eq!(result.position_size, dec!(500));
        assert!(result.is_allowed());
    }

    #[test]
    fn test_size_rounds_half_to_even() {
        // 600 / 1200 = 0.5 -> 0
        assert_eq!(sizer().size(12.0).contracts, 0);
        // 600 / 400 = 1.5 -> 2
        assert_eq!(sizer().size(4.0).contracts, 2);
    }

    #[test]
    fn test_expensive_spread_gets_zero_contracts() {
        // 600 / 1300 = 0.46 -> 0
        let result = sizer().size(13.0);
        assert_eq!(result.contracts, 0);
        assert_eq!(result.position_size, Decimal::ZERO);
        assert!(!result.is_allowed());
    }

    #[test]
    fn test_degenerate_cost() {
        assert_eq!(sizer().size(0.0).contracts, 0);
        assert_eq!(sizer().size(-1.0).contracts, 0);
        assert_eq!(sizer().size(f64::NAN).contracts, 0);
    }

    #[test]
    fn test_validate_rejects_bad_fractions() {
        let config = PositionSizerConfig {
            trade_size_pct: 0.0,
            ..PositionSizerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PositionSizerConfig {
            account_size: dec!(-1),
            ..PositionSizerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

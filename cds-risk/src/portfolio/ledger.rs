//! Open-position ledger with allocation limits.
//!
//! Caps are enforced when a position is opened. Open positions are never
//! re-validated after price moves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::SpreadCandidate;
use crate::risk::{PositionSizerConfig, SizingResult};

/// Ledger-local position identifier, assigned in entry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

/// An open call debit spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub spread: SpreadCandidate,
    /// Step (or day number) the position was opened.
    pub entry_step: i64,
    /// Contracts bought (>= 1).
    pub contracts: i64,
    /// Dollars committed.
    pub position_size: Decimal,
}

impl Position {
    pub fn asset(&self) -> &str {
        &self.spread.asset
    }

    /// Steps left until expiration at `now`.
    pub fn remaining(&self, now: i64) -> i64 {
        self.spread.expiration - now
    }
}

/// Why a sized candidate was not opened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationRejected {
    #[error("Spread too expensive for the trade size (0 contracts)")]
    ZeroContracts,

    #[error("{asset} allocation {current} + {requested} would reach the cap {cap}")]
    AssetCapExceeded {
        asset: String,
        current: Decimal,
        requested: Decimal,
        cap: Decimal,
    },

    #[error("Committed capital {committed} + {requested} would exceed {cap}")]
    AccountCapExceeded {
        committed: Decimal,
        requested: Decimal,
        cap: Decimal,
    },
}

/// Open positions in entry order.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    config: PositionSizerConfig,
    positions: Vec<Position>,
    next_id: u64,
}

impl PositionLedger {
    pub fn new(config: PositionSizerConfig) -> Self {
        Self {
            config,
            positions: Vec::new(),
            next_id: 0,
        }
    }

    /// Open a position if the sizing passes every cap.
    ///
    /// The per-asset check is strict: the new allocation must stay below the cap.
    pub fn open(
        &mut self,
        spread: SpreadCandidate,
        sizing: &SizingResult,
        entry_step: i64,
    ) -> Result<&Position, AllocationRejected> {
        if !sizing.is_allowed() {
            return Err(AllocationRejected::ZeroContracts);
        }

        let current = self.current_allocation(&spread.asset);
        let cap = self.config.asset_cap();
        if current + sizing.position_size >= cap {
            return Err(AllocationRejected::AssetCapExceeded {
                asset: spread.asset.clone(),
                current,
                requested: sizing.position_size,
                cap,
            });
        }

        let committed = self.total_committed();
        let total_cap = self.config.total_cap().min(self.config.account_size);
        if committed + sizing.position_size > total_cap {
            return Err(AllocationRejected::AccountCapExceeded {
                committed,
                requested: sizing.position_size,
                cap: total_cap,
            });
        }

        let id = PositionId(self.next_id);
        self.next_id += 1;
        self.positions.push(Position {
            id,
            spread,
            entry_step,
            contracts: sizing.contracts,
            position_size: sizing.position_size,
        });
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Remove a position, returning it if it was open.
    pub fn close(&mut self, id: PositionId) -> Option<Position> {
        let idx = self.positions.iter().position(|p| p.id == id)?;
        Some(self.positions.remove(idx))
    }

    /// Dollars committed to open positions on `asset`.
    pub fn current_allocation(&self, asset: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.asset() == asset)
            .map(|p| p.position_size)
            .sum()
    }

    /// Dollars committed to all open positions.
    pub fn total_committed(&self) -> Decimal {
        self.positions.iter().map(|p| p.position_size).sum()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn config(&self) -> &PositionSizerConfig {
        &self.config
    }
}

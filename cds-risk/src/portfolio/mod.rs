//! Portfolio bookkeeping.
//!
//! - Position ledger with allocation caps
//! - Position lifecycle state machine
//! - Per-trial state (ledger + cumulative PnL)

pub mod ledger;
pub mod lifecycle;
pub mod state;

pub use ledger::{AllocationRejected, Position, PositionId, PositionLedger};
pub use lifecycle::{
    ClosedTrade, ExitState, MarketSnapshot, PositionLifecycle, StepFailure, StepReport, Transition,
};
pub use state::PortfolioState;

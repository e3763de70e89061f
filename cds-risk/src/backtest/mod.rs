//! Trial execution for the call debit spread strategy.
//!
//! This module drives the strategy over price series:
//! - Entry pipeline (trigger, volatility, forecast, selection, sizing)
//! - Single Monte Carlo trials over simulated paths
//! - Batches of trials, sequential or parallel
//! - Historical-date replay over aligned asset histories

pub mod driver;
pub mod entry;
pub mod replay;
pub mod trial;

pub use driver::{trial_seed, SimulationDriver, SimulationOutcome};
pub use entry::{entry_signal, EntryOutcome, EntryPlanner, EntryRequest};
pub use replay::{HistoricalReplay, ReplayResult};
pub use trial::{TrialResult, TrialRunner};

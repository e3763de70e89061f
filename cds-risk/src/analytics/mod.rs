//! Options analytics module.
//!
//! Provides:
//! - Call debit spread enumeration, filtering and random selection

pub mod spread_selector;

pub use spread_selector::{EntryQuote, SelectionOutcome, SpreadCandidate, SpreadSelector};

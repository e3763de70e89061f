//! Risk management module.
//!
//! Provides:
//! - Fixed-fraction position sizing
//! - Per-asset and account allocation caps

pub mod position_sizer;

pub use position_sizer::{PositionSizer, PositionSizerConfig, SizingResult};

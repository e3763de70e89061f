//! Synthetic price paths.
//!
//! - GBM calibration and path generation
//! - Path universe shared by all trials

pub mod gbm;
pub mod universe;

pub use gbm::{GbmCalibration, PathSimulator, SimulatedPath};
pub use universe::{AssetPaths, PathUniverse};

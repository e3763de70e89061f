//! Error taxonomy shared by the simulation engine.
//!
//! - `PreconditionError`: invalid inputs, always fatal to the calling operation
//! - `EngineError`: everything a top-level run can fail with
//!
//! Recoverable outcomes (no eligible spread, allocation rejected, anomalous
//! trial end) are values, not errors. See `SelectionOutcome`,
//! `AllocationRejected` and `Anomaly`.

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::ConfigError;
use crate::data::LoaderError;
use crate::forecast::ForecastError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreconditionError {
    #[error("Insufficient history for {asset}: {available_days} days available, {required_days} required")]
    InsufficientHistory {
        asset: String,
        available_days: i64,
        required_days: i64,
    },

    #[error("History for {asset} is not sorted ascending by date (row {row})")]
    UnsortedHistory { asset: String, row: usize },

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("Volatility must be positive, got {0}")]
    NonPositiveVolatility(f64),

    #[error("Time to expiry must be positive, got {0}")]
    NonPositiveTime(f64),

    #[error("No valid log-returns in series")]
    NoReturns,

    #[error("Invalid forecast interval [{low}, {high}]")]
    InvalidInterval { low: f64, high: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Asset {asset} has no row for {date}")]
    MisalignedDates { asset: String, date: NaiveDate },

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Forecast failed: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type EngineResult<T> = Result<T, EngineError>;

pub mod loader;
pub mod types;

pub use loader::{check_aligned, HistoryLoader, LoaderError, OPTIONAL_COLUMNS, REQUIRED_COLUMNS};
pub use types::{log_returns, trailing_mean, AssetHistory, PriceBar, RawBar};

pub mod analytics;
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod forecast;
pub mod metrics;
pub mod portfolio;
pub mod pricing;
pub mod risk;
pub mod simulation;

// Re-export commonly used types
pub use analytics::{SelectionOutcome, SpreadCandidate, SpreadSelector};
pub use backtest::{
    HistoricalReplay, ReplayResult, SimulationDriver, SimulationOutcome, TrialResult, TrialRunner,
};
pub use config::SimulationConfig;
pub use data::{AssetHistory, HistoryLoader, PriceBar};
pub use error::{EngineError, EngineResult, PreconditionError};
pub use events::{EngineEvent, EventSink, MemoryEventSink, TracingEventSink};
pub use forecast::{Forecast, ForecastInterval, Forecaster, RandomWalkForecaster};
pub use metrics::DistributionSummary;
pub use portfolio::{ExitState, Position, PositionLedger, PositionLifecycle};
pub use pricing::{price_call, VolatilityEstimator};
pub use risk::{PositionSizer, PositionSizerConfig};
pub use simulation::{PathSimulator, PathUniverse, SimulatedPath};

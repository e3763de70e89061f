//! End-to-end position and trial scenarios.

use cds_risk::config::{PathConfig, SimulationConfig};
use cds_risk::data::AssetHistory;
use cds_risk::error::PreconditionError;
use cds_risk::events::{EngineEvent, MemoryEventSink};
use cds_risk::forecast::{Forecast, ForecastError, ForecastInterval, ForecastParams, RandomWalkForecaster};
use cds_risk::portfolio::{ExitState, MarketSnapshot, PortfolioState, PositionLifecycle};
use cds_risk::risk::{PositionSizerConfig, SizingResult};
use cds_risk::simulation::{AssetPaths, GbmCalibration, PathSimulator, PathUniverse};
use cds_risk::{SimulationDriver, SpreadCandidate, TrialRunner};
use chrono::{Duration, NaiveDate};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rust_decimal_macros::dec;

struct Quote {
    spot: f64,
    sigma: f64,
}

impl MarketSnapshot for Quote {
    fn spot(&self, _asset: &str) -> Result<f64, PreconditionError> {
        Ok(self.spot)
    }

    fn volatility(&self, _asset: &str) -> Result<f64, PreconditionError> {
        Ok(self.sigma)
    }

    fn risk_free_rate(&self, _asset: &str) -> Result<f64, PreconditionError> {
        Ok(0.03)
    }
}

fn history(asset: &str) -> AssetHistory {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let closes: Vec<(NaiveDate, f64)> = (0..400)
        .map(|i| (start + Duration::days(i), 100.0 + 0.02 * i as f64 + 3.0 * (i as f64 / 5.0).sin()))
        .collect();
    AssetHistory::from_closes(asset, &closes, 0.03).unwrap()
}

/// Interval from 10% below to 30% above the last observation.
fn wide_band(series: &[f64], _: &ForecastParams) -> Result<Forecast, ForecastError> {
    let last = series[series.len() - 1];
    Ok(Forecast {
        point: last,
        interval: ForecastInterval::new(last * 0.9, last * 1.3)?,
    })
}

/// Portfolio with one open 100/110 spread: cost 2, max profit 8, 1 contract.
fn portfolio_with_spread(expiration: i64) -> PortfolioState {
    let mut state = PortfolioState::new(PositionSizerConfig::default());
    let spread = SpreadCandidate {
        asset: "SPY".to_string(),
        expiration,
        long_strike: 100.0,
        short_strike: 110.0,
        long_premium: 6.0,
        short_premium: 4.0,
        spread_cost: 2.0,
        max_profit: 8.0,
    };
    let sizing = SizingResult {
        contracts: 1,
        trade_size: dec!(600),
        position_size: dec!(200),
    };
    state.ledger.open(spread, &sizing, 0).unwrap();
    state
}

#[test]
fn test_declining_path_never_trades() {
    let simulator = PathSimulator::new(PathConfig {
        num_paths: 3,
        ..PathConfig::default()
    });
    let calibration = GbmCalibration {
        mu: -0.05,
        sigma: 0.0001,
        initial_price: 100.0,
    };
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let paths = simulator.simulate_with("SPY", &calibration, &mut rng).unwrap();
    let universe =
        PathUniverse::from_assets(vec![AssetPaths::new(history("SPY"), Some(calibration), paths)])
            .unwrap();

    let config = SimulationConfig::default();
    let events = MemoryEventSink::new();
    let runner = TrialRunner::new(&universe, &config, &RandomWalkForecaster, &events);
    let result = runner.run(0, &mut rng);

    assert_eq!(result.pnl.len(), config.paths.horizon_steps() + 1);
    assert!(result.pnl.iter().all(|v| *v == 0.0));
    assert!(!result.is_anomalous());
    assert!(events.events().is_empty());
}

#[test]
fn test_early_profit_inside_window() {
    let lifecycle = PositionLifecycle::default();
    let mut state = portfolio_with_spread(100);

    // Deep in the money 50 steps before expiration
    let report = lifecycle.advance(&mut state.ledger, 50, &Quote { spot: 200.0, sigma: 0.2 });

    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].state, ExitState::ClosedEarlyProfit);
    assert_eq!(report.pnl(), 2.8);
    assert!(state.ledger.is_empty());

    state.record(report);
    let (pnl, closed, _) = state.finish(100.0);
    assert!((pnl[1] - 280.0).abs() < 1e-9);
    assert!((closed[0].pnl - 280.0).abs() < 1e-9);
}

#[test]
fn test_expiration_settles_at_max_profit_or_cost() {
    let lifecycle = PositionLifecycle::default();

    let mut itm = portfolio_with_spread(100);
    let report = lifecycle.advance(&mut itm.ledger, 100, &Quote { spot: 115.0, sigma: 0.2 });
    assert_eq!(report.closed[0].state, ExitState::ExpiredItm);
    assert_eq!(report.pnl(), 8.0);
    assert!(itm.ledger.is_empty());

    let mut otm = portfolio_with_spread(100);
    let report = lifecycle.advance(&mut otm.ledger, 100, &Quote { spot: 95.0, sigma: 0.2 });
    assert_eq!(report.closed[0].state, ExitState::ExpiredOtm);
    assert_eq!(report.pnl(), -2.0);
    assert!(otm.ledger.is_empty());
}

#[test]
fn test_trial_reports_every_open_position() {
    let simulator = PathSimulator::new(PathConfig {
        num_paths: 5,
        horizon_years: 3,
        ..PathConfig::default()
    });
    let universe =
        PathUniverse::build(vec![history("SPY"), history("QQQ")], &simulator, Some(21)).unwrap();

    let mut config = SimulationConfig::default();
    config.strategy.years_to_expiration = 1;
    let events = MemoryEventSink::new();
    let runner = TrialRunner::new(&universe, &config, &wide_band, &events);

    for trial in 0..5 {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(trial as u64);
        let result = runner.run(trial, &mut rng);
        let recorded = events.take();

        let opened = recorded
            .iter()
            .filter(|e| matches!(e, EngineEvent::CandidateTrade { .. }))
            .count();
        assert!(opened > 0, "trial {} opened nothing", trial);
        assert!(!result.closed.is_empty());

        let still_open = result.anomaly.as_ref().map(|a| a.open_positions).unwrap_or(0);
        assert_eq!(opened, result.closed.len() + still_open);

        let realized: f64 = result.closed.iter().map(|t| t.pnl).sum();
        assert!((realized - result.final_pnl()).abs() < 1e-6);
    }
}

#[test]
fn test_reported_seed_reproduces_unseeded_run() {
    let simulator = PathSimulator::new(PathConfig {
        num_paths: 4,
        horizon_years: 3,
        ..PathConfig::default()
    });
    let mut config = SimulationConfig::default();
    config.strategy.years_to_expiration = 1;
    config.trials.num_trials = 3;
    let events = MemoryEventSink::new();

    let run = |seed: u64| {
        let universe =
            PathUniverse::build(vec![history("SPY")], &simulator, Some(seed)).unwrap();
        let mut trials = config.trials.clone();
        trials.seed = Some(seed);
        SimulationDriver::new(TrialRunner::new(&universe, &config, &wide_band, &events), trials)
            .run()
            .unwrap()
    };

    let mut unseeded = config.trials.clone();
    assert_eq!(unseeded.seed, None);
    let seed = unseeded.resolve_seed();

    let first = run(seed);
    assert_eq!(first.base_seed, seed);
    let rerun = run(first.base_seed);
    assert_eq!(rerun, first);
}

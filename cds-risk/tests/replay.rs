//! Historical replay from CSV files on disk.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use cds_risk::events::MemoryEventSink;
use cds_risk::forecast::{Forecast, ForecastError, ForecastInterval, ForecastParams};
use cds_risk::{HistoricalReplay, HistoryLoader, SimulationConfig};
use chrono::{Duration, NaiveDate};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cds_risk_replay_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_history(dir: &Path, file: &str, scale: f64, days: i64) {
    let start = NaiveDate::from_ymd_opt(2016, 1, 4).unwrap();
    let mut body = String::from("Date,Close,Risk-free Rate\n");
    for i in 0..days {
        let close = scale * (100.0 + 0.05 * i as f64 + 3.0 * (i as f64 / 5.0).sin());
        writeln!(body, "{},{:.4},0.025", start + Duration::days(i), close).unwrap();
    }
    std::fs::write(dir.join(file), body).unwrap();
}

fn band(series: &[f64], _: &ForecastParams) -> Result<Forecast, ForecastError> {
    let last = series[series.len() - 1];
    Ok(Forecast {
        point: last,
        interval: ForecastInterval::new(last - 5.0, last + 15.0)?,
    })
}

#[test]
fn test_replay_loaded_histories() {
    let dir = data_dir("loaded");
    write_history(&dir, "spy_data.csv", 1.0, 1500);
    write_history(&dir, "qqq_data.csv", 1.5, 1500);

    let histories = HistoryLoader::new(&dir).load_all().unwrap();
    assert_eq!(histories.len(), 2);

    let config = SimulationConfig::default();
    let events = MemoryEventSink::new();
    let replay = HistoricalReplay::new(&histories, &config, &band, &events).unwrap();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
    let first = replay.run(&mut rng);
    assert_eq!(first.pnl.len(), 1501);
    assert!(!first.closed.is_empty());
    assert!(!first.is_anomalous());
    assert!(first
        .closed
        .iter()
        .all(|t| t.asset == "SPY" || t.asset == "QQQ"));

    // Same seed, same replay
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
    assert_eq!(replay.run(&mut rng), first);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_replay_rejects_misaligned_files() {
    let dir = data_dir("misaligned");
    write_history(&dir, "spy_data.csv", 1.0, 600);
    write_history(&dir, "qqq_data.csv", 1.0, 590);

    let histories = HistoryLoader::new(&dir).load_all().unwrap();
    let config = SimulationConfig::default();
    let events = MemoryEventSink::new();
    assert!(HistoricalReplay::new(&histories, &config, &band, &events).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}

//! Call debit spread Monte Carlo risk CLI.
//!
//! Usage:
//! ```bash
//! # Simulate 500 trials over GBM paths calibrated from data/*.csv
//! cds-risk simulate --config config/default.toml --data data --trials 500 --output results/sim.json
//!
//! # Replay the strategy over the historical dates
//! cds-risk replay --config config/default.toml --data data --output results/replay.json
//!
//! # Print the default configuration
//! cds-risk default-config
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use tracing::info;

use cds_risk::{
    DistributionSummary, HistoricalReplay, HistoryLoader, PathSimulator, PathUniverse,
    RandomWalkForecaster, ReplayResult, SimulationConfig, SimulationDriver, TracingEventSink,
    TrialResult, TrialRunner,
};

#[derive(Parser)]
#[command(name = "cds-risk")]
#[command(about = "Monte Carlo risk simulation for call debit spread portfolios")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Monte Carlo trials over simulated price paths
    Simulate {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of per-asset CSV histories
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// Number of trials (overrides the config)
        #[arg(short = 'n', long)]
        trials: Option<usize>,

        /// Base seed (overrides the config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Run trials one after another
        #[arg(long)]
        sequential: bool,

        /// Worker threads for parallel trials
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay the strategy over the aligned historical dates
    Replay {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of per-asset CSV histories
        #[arg(short, long, default_value = "data")]
        data: PathBuf,

        /// Seed for spread sampling
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    config: &'a SimulationConfig,
    base_seed: u64,
    summary: Option<DistributionSummary>,
    trials: &'a [TrialResult],
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    config: &'a SimulationConfig,
    assets: Vec<String>,
    result: &'a ReplayResult,
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let config = match path {
        Some(p) => SimulationConfig::from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => SimulationConfig::default(),
    };
    Ok(config)
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    config: Option<PathBuf>,
    data: PathBuf,
    trials: Option<usize>,
    seed: Option<u64>,
    sequential: bool,
    workers: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(n) = trials {
        config.trials.num_trials = n;
    }
    if seed.is_some() {
        config.trials.seed = seed;
    }
    if workers.is_some() {
        config.trials.workers = workers;
        config.trials.parallel = true;
    }
    if sequential {
        config.trials.parallel = false;
    }
    config.validate().context("Invalid configuration")?;
    let base_seed = config.trials.resolve_seed();

    let histories = HistoryLoader::new(&data)
        .load_all()
        .with_context(|| format!("Failed to load histories from {}", data.display()))?;
    info!("Loaded {} asset histories", histories.len());

    let simulator = PathSimulator::new(config.paths.clone());
    let universe = PathUniverse::build(histories, &simulator, Some(base_seed))
        .context("Path simulation failed")?;

    let forecaster = RandomWalkForecaster;
    let events = TracingEventSink;
    let runner = TrialRunner::new(&universe, &config, &forecaster, &events);
    let driver = SimulationDriver::new(runner, config.trials.clone());

    let pb = ProgressBar::new(config.trials.num_trials as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message("trials");
    let outcome = driver.run_with_progress(&|done| pb.set_position(done as u64))?;
    pb.finish_with_message("done");

    let summary = outcome.summary();
    if let Some(s) = &summary {
        println!("{}", s.summary());
    }
    println!("Base seed: {}", outcome.base_seed);

    if let Some(path) = output {
        let report = SimulationReport {
            config: &config,
            base_seed: outcome.base_seed,
            summary,
            trials: &outcome.results,
        };
        write_report(&path, &report)?;
    }
    Ok(())
}

fn cmd_replay(
    config: Option<PathBuf>,
    data: PathBuf,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config.as_deref())?;
    config.validate().context("Invalid configuration")?;

    let histories = HistoryLoader::new(&data)
        .load_all()
        .with_context(|| format!("Failed to load histories from {}", data.display()))?;

    let forecaster = RandomWalkForecaster;
    let events = TracingEventSink;
    let replay = HistoricalReplay::new(&histories, &config, &forecaster, &events)
        .context("Histories cannot be replayed")?;

    let mut rng = match seed.or(config.trials.seed) {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_os_rng(),
    };
    let result = replay.run(&mut rng);

    println!(
        "Replay: {} dates, {} trades, final PnL ${:.2}{}",
        result.dates.len(),
        result.closed.len(),
        result.final_pnl(),
        if result.is_anomalous() { " (open positions left)" } else { "" }
    );

    if let Some(path) = output {
        let report = ReplayReport {
            config: &config,
            assets: histories.iter().map(|h| h.asset.clone()).collect(),
            result: &result,
        };
        write_report(&path, &report)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cds_risk=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            data,
            trials,
            seed,
            sequential,
            workers,
            output,
        } => cmd_simulate(config, data, trials, seed, sequential, workers, output)?,
        Commands::Replay {
            config,
            data,
            seed,
            output,
        } => cmd_replay(config, data, seed, output)?,
        Commands::DefaultConfig => {
            print!("{}", SimulationConfig::default().to_toml()?);
        }
    }

    Ok(())
}

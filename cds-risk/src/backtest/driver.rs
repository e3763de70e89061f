//! Batch execution of independent trials.
//!
//! Every trial gets its own generator seeded from `(base_seed, trial)`, so a
//! batch gives the same results sequentially or on a rayon pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::trial::{TrialResult, TrialRunner};
use crate::config::TrialConfig;
use crate::error::{EngineResult, PreconditionError};
use crate::metrics::DistributionSummary;

/// Seed of one trial's generator (splitmix64 over the base seed).
pub fn trial_seed(base_seed: u64, trial: usize) -> u64 {
    let mut z = base_seed.wrapping_add((trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Results of a batch, in trial order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Seed the trials ran with. Re-running with it reproduces the results
    /// when the path universe was built from the same seed.
    pub base_seed: u64,
    pub results: Vec<TrialResult>,
}

impl SimulationOutcome {
    pub fn anomalies(&self) -> impl Iterator<Item = &TrialResult> {
        self.results.iter().filter(|r| r.is_anomalous())
    }

    pub fn summary(&self) -> Option<DistributionSummary> {
        DistributionSummary::from_trials(&self.results)
    }
}

/// Runs N trials of a `TrialRunner`.
pub struct SimulationDriver<'a> {
    runner: TrialRunner<'a>,
    config: TrialConfig,
}

impl<'a> SimulationDriver<'a> {
    pub fn new(runner: TrialRunner<'a>, config: TrialConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn run(&self) -> EngineResult<SimulationOutcome> {
        self.run_with_progress(&|_| {})
    }

    /// Run the batch. `progress` is called with the number of finished trials.
    pub fn run_with_progress(
        &self,
        progress: &(dyn Fn(usize) + Sync),
    ) -> EngineResult<SimulationOutcome> {
        let total = self.config.num_trials;
        if total == 0 {
            return Err(PreconditionError::InvalidParameter("num_trials must be positive".to_string()).into());
        }

        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            trials = total,
            base_seed,
            parallel = self.config.parallel,
            paths = self.runner.universe().num_paths(),
            "Starting simulation batch"
        );

        let done = AtomicUsize::new(0);
        let run_one = |trial: usize| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(trial_seed(base_seed, trial));
            let result = self.runner.run(trial, &mut rng);

            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress(finished);
            if finished % (total / 10).max(1) == 0 || finished == total {
                info!(
                    "  {:.0}% ({}/{} trials)",
                    finished as f64 / total as f64 * 100.0,
                    finished,
                    total
                );
            }
            result
        };

        let results: Vec<TrialResult> = if !self.config.parallel {
            (0..total).map(run_one).collect()
        } else if let Some(workers) = self.config.workers {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
            pool.install(|| (0..total).into_par_iter().map(run_one).collect())
        } else {
            (0..total).into_par_iter().map(run_one).collect()
        };

        let outcome = SimulationOutcome { base_seed, results };
        let anomalies = outcome.anomalies().count();
        if anomalies > 0 {
            warn!(anomalies, trials = total, "Trials ended with open positions");
        }
        info!(trials = total, anomalies, "Simulation batch complete");
        Ok(outcome)
    }
}
